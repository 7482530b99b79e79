//! Pattern analysis
//!
//! Descriptive statistics over a document, for callers that want a quick
//! picture of what is playing without reading every field.

use crate::document::{PatternDocument, Waveform};
use crate::note::{is_rest, NoteName};
use serde::Serialize;
use std::collections::BTreeSet;

/// Summary of a pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternSummary {
    /// Tempo
    pub bpm: i64,
    /// Tempo band description
    pub tempo_description: &'static str,
    /// Distinct notes used, ordered by octave then pitch class
    pub all_notes_used: Vec<String>,
    /// Number of distinct notes
    pub note_count: usize,
    /// Number of chords in the progression
    pub chord_count: usize,
    /// Number of melody steps, rests included
    pub melody_note_count: usize,
    /// Fraction of melody steps that sound, rounded to two places
    pub melody_density: f64,
    /// Low-pass cutoff in Hz
    pub filter_cutoff: i64,
    /// Melody oscillator
    pub waveform: Waveform,
    /// Echo amount
    pub delay_amount: f64,
    /// Percussion statistics
    pub drums: Option<DrumSummary>,
}

/// Percussion statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrumSummary {
    /// Kick hits per loop
    pub kick_hits: usize,
    /// Snare hits per loop
    pub snare_hits: usize,
    /// Steps per loop
    pub total_steps: usize,
    /// Kick hits / steps
    pub kick_density: f64,
    /// Snare hits / steps
    pub snare_density: f64,
}

/// Describe a tempo in words
#[must_use]
pub fn tempo_description(bpm: i64) -> &'static str {
    match bpm {
        i64::MIN..=29 => "Very Slow - Extremely Meditative",
        30..=39 => "Very Slow - Meditative",
        40..=59 => "Slow - Ambient",
        60..=79 => "Moderate - Relaxed",
        80..=99 => "Moderate - Steady",
        _ => "Faster - Energetic",
    }
}

/// Summarize a document
#[must_use]
pub fn summarize(doc: &PatternDocument) -> PatternSummary {
    // (octave, pitch class) keys give octave-major ordering
    let mut used: BTreeSet<(u8, String)> = BTreeSet::new();
    let sounding = doc
        .chords
        .progression
        .iter()
        .flatten()
        .chain(doc.melody.notes.iter())
        .filter(|n| !is_rest(n));
    for note in sounding {
        match NoteName::parse(note) {
            Ok(parsed) => used.insert((parsed.octave, parsed.pitch_class())),
            // keep unparseable names visible at the end
            Err(_) => used.insert((u8::MAX, note.clone())),
        };
    }
    let all_notes_used: Vec<String> = used
        .into_iter()
        .map(|(octave, name)| {
            if octave == u8::MAX {
                name
            } else {
                format!("{name}{octave}")
            }
        })
        .collect();

    let melody = &doc.melody.notes;
    let rests = melody.iter().filter(|n| is_rest(n)).count();
    let melody_density = ratio(melody.len() - rests, melody.len());

    let drums = doc.drums.as_ref().map(|d| {
        let kick_hits = d.kick.iter().filter(|&&s| s == 1).count();
        let snare_hits = d.snare.iter().filter(|&&s| s == 1).count();
        let total_steps = d.kick.len();
        DrumSummary {
            kick_hits,
            snare_hits,
            total_steps,
            kick_density: ratio(kick_hits, total_steps),
            snare_density: ratio(snare_hits, total_steps),
        }
    });

    PatternSummary {
        bpm: doc.bpm,
        tempo_description: tempo_description(doc.bpm),
        note_count: all_notes_used.len(),
        all_notes_used,
        chord_count: doc.chords.progression.len(),
        melody_note_count: melody.len(),
        melody_density,
        filter_cutoff: doc.chords.filter,
        waveform: doc.melody.waveform,
        delay_amount: doc.melody.delay,
        drums,
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).round() / 100.0
}
