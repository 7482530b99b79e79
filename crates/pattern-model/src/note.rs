//! Note-name grammar
//!
//! `letter [accidental] octave` where letter is `A`-`G`, accidental is `#` or
//! `b`, and octave is a single digit `0`-`8`. The grammar is checked
//! structurally, so enharmonic spellings such as `Cb4` or `E#2` are accepted.

use std::fmt;
use std::str::FromStr;

/// Rest marker, legal only in melody notes
pub const REST: &str = "~";

/// Highest octave digit
pub const MAX_OCTAVE: u8 = 8;

/// Pitch alteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Accidental {
    /// `b`
    Flat,
    /// `#`
    Sharp,
}

/// A syntactically valid note name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    /// `A` through `G`
    pub letter: char,
    /// Optional alteration
    pub accidental: Option<Accidental>,
    /// 0 through 8
    pub octave: u8,
}

/// Why a string is not a note name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    /// Nothing to parse
    #[error("empty note name")]
    Empty,

    /// First character is not `A`-`G`
    #[error("invalid note letter '{0}' (expected A-G)")]
    Letter(char),

    /// Octave digit missing or not a digit
    #[error("missing octave digit in '{0}'")]
    MissingOctave(String),

    /// Octave digit above 8
    #[error("octave {0} out of range 0-8")]
    OctaveOutOfRange(u8),

    /// Characters after the octave digit
    #[error("unexpected trailing characters in '{0}'")]
    Trailing(String),
}

impl NoteName {
    /// Parse a note name
    ///
    /// # Errors
    /// Returns the first grammar rule the input breaks.
    pub fn parse(s: &str) -> Result<Self, NoteError> {
        let mut chars = s.chars().peekable();

        let letter = chars.next().ok_or(NoteError::Empty)?;
        if !('A'..='G').contains(&letter) {
            return Err(NoteError::Letter(letter));
        }

        let accidental = match chars.peek() {
            Some('#') => Some(Accidental::Sharp),
            Some('b') => Some(Accidental::Flat),
            _ => None,
        };
        if accidental.is_some() {
            chars.next();
        }

        let octave = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| NoteError::MissingOctave(s.to_string()))?;
        // to_digit(10) is at most 9
        let octave = octave as u8;
        if octave > MAX_OCTAVE {
            return Err(NoteError::OctaveOutOfRange(octave));
        }

        if chars.next().is_some() {
            return Err(NoteError::Trailing(s.to_string()));
        }

        Ok(Self {
            letter,
            accidental,
            octave,
        })
    }

    /// Pitch class without the octave, e.g. `"F#"`
    #[must_use]
    pub fn pitch_class(&self) -> String {
        let mut out = String::with_capacity(2);
        out.push(self.letter);
        match self.accidental {
            Some(Accidental::Sharp) => out.push('#'),
            Some(Accidental::Flat) => out.push('b'),
            None => {}
        }
        out
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave)
    }
}

impl FromStr for NoteName {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether `s` is the rest marker
#[inline]
#[must_use]
pub fn is_rest(s: &str) -> bool {
    s == REST
}
