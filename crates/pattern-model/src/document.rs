//! Pattern document types
//!
//! Numeric fields are stored wide enough to hold out-of-range values so the
//! validator can report them; enumerated fields are closed types and can only
//! hold legal values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted tempo
pub const MIN_BPM: i64 = 20;
/// Highest accepted tempo
pub const MAX_BPM: i64 = 120;
/// Lowest accepted low-pass cutoff in Hz
pub const MIN_FILTER: i64 = 100;
/// Highest accepted low-pass cutoff in Hz
pub const MAX_FILTER: i64 = 2000;
/// Most notes a single chord may stack
pub const MAX_CHORD_NOTES: usize = 6;

/// A chord: notes sounded together, lowest first by convention
pub type Chord = Vec<String>;

/// The complete pattern currently in effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDocument {
    /// Tempo in beats per minute
    pub bpm: i64,
    /// Harmony
    pub chords: ChordSection,
    /// Lead line
    pub melody: MelodySection,
    /// Percussion (pure ambient patterns omit it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drums: Option<DrumSection>,
}

/// Harmony parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordSection {
    /// Chords in playing order
    pub progression: Vec<Chord>,
    /// How often the chord changes
    pub interval: TimeInterval,
    /// How long each chord sustains
    pub duration: TimeInterval,
    /// Low-pass cutoff in Hz
    pub filter: i64,
}

/// Melody parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodySection {
    /// Note names or the rest marker
    pub notes: Vec<String>,
    /// Time between notes
    pub interval: TimeInterval,
    /// Length of each note
    pub duration: TimeInterval,
    /// Oscillator shape
    pub waveform: Waveform,
    /// Echo amount, 0.0 to 1.0
    pub delay: f64,
}

/// Step-sequenced percussion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumSection {
    /// Kick steps (1 = hit)
    pub kick: Vec<u8>,
    /// Snare steps (1 = hit), same length as `kick`
    pub snare: Vec<u8>,
    /// Hi-hat steps, independent length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hihat: Option<Vec<u8>>,
    /// Loop length
    pub interval: TimeInterval,
}

/// Text that does not name a variant of a closed enumeration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct UnknownVariant {
    /// Enumeration name
    pub kind: &'static str,
    /// Offending text
    pub value: String,
    /// Comma-separated legal values
    pub expected: String,
}

/// Musical time notation understood by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInterval {
    /// One measure
    #[serde(rename = "1m")]
    OneMeasure,
    /// Two measures
    #[serde(rename = "2m")]
    TwoMeasures,
    /// Four measures
    #[serde(rename = "4m")]
    FourMeasures,
    /// Eight measures
    #[serde(rename = "8m")]
    EightMeasures,
    /// An eighth note
    #[serde(rename = "8n")]
    EighthNote,
}

impl TimeInterval {
    /// All variants in notation order
    pub const ALL: [Self; 5] = [
        Self::OneMeasure,
        Self::TwoMeasures,
        Self::FourMeasures,
        Self::EightMeasures,
        Self::EighthNote,
    ];

    /// Notation as written in the pattern file
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMeasure => "1m",
            Self::TwoMeasures => "2m",
            Self::FourMeasures => "4m",
            Self::EightMeasures => "8m",
            Self::EighthNote => "8n",
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeInterval {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "time interval",
                value: s.to_string(),
                expected: join_names(Self::ALL.iter().map(|v| v.as_str())),
            })
    }
}

/// Synthesizer oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Pure tone
    Sine,
    /// Soft
    Triangle,
    /// Bright
    Sawtooth,
    /// Hollow
    Square,
}

impl Waveform {
    /// All variants
    pub const ALL: [Self; 4] = [Self::Sine, Self::Triangle, Self::Sawtooth, Self::Square];

    /// Name as written in the pattern file
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sine => "sine",
            Self::Triangle => "triangle",
            Self::Sawtooth => "sawtooth",
            Self::Square => "square",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Waveform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "waveform",
                value: s.to_string(),
                expected: join_names(Self::ALL.iter().map(|v| v.as_str())),
            })
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_interval_parses_every_notation() {
        for interval in TimeInterval::ALL {
            assert_eq!(interval.as_str().parse::<TimeInterval>().unwrap(), interval);
        }
    }

    #[test]
    fn unknown_interval_lists_expected_values() {
        let err = "16n".parse::<TimeInterval>().unwrap_err();
        assert_eq!(err.value, "16n");
        assert!(err.to_string().contains("1m, 2m, 4m, 8m, 8n"));
    }

    #[test]
    fn waveform_is_case_sensitive() {
        assert_eq!("square".parse::<Waveform>().unwrap(), Waveform::Square);
        assert!("Square".parse::<Waveform>().is_err());
    }

    #[test]
    fn document_json_omits_absent_drums() {
        let doc = PatternDocument {
            bpm: 60,
            chords: ChordSection {
                progression: vec![vec!["C3".into(), "E3".into(), "G3".into()]],
                interval: TimeInterval::FourMeasures,
                duration: TimeInterval::TwoMeasures,
                filter: 800,
            },
            melody: MelodySection {
                notes: vec!["C5".into(), "~".into()],
                interval: TimeInterval::TwoMeasures,
                duration: TimeInterval::OneMeasure,
                waveform: Waveform::Sine,
                delay: 0.5,
            },
            drums: None,
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("drums").is_none());
        assert_eq!(json["chords"]["interval"], "4m");
        assert_eq!(json["melody"]["waveform"], "sine");
    }
}
