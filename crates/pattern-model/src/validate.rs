//! Document validation
//!
//! `validate` is pure and total: every constraint is checked independently and
//! all violations are returned together, in field order. A document is
//! persistable only when the list is empty.

use crate::document::{
    DrumSection, PatternDocument, MAX_BPM, MAX_CHORD_NOTES, MAX_FILTER, MIN_BPM, MIN_FILTER,
};
use crate::note::{is_rest, NoteName};
use std::fmt;

/// One broken constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted field path, with `[i]` for sequence positions
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl Violation {
    /// Create a new violation
    #[inline]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// A document that may not be persisted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pattern has {} violation(s): {}", .violations.len(), join(.violations))]
pub struct ValidationError {
    /// Every violation found
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Fields named by the violations, in order
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collect every constraint violation in `doc`
#[must_use]
pub fn validate(doc: &PatternDocument) -> Vec<Violation> {
    let mut out = Vec::new();

    if !(MIN_BPM..=MAX_BPM).contains(&doc.bpm) {
        out.push(Violation::new(
            "bpm",
            format!("{} is outside {MIN_BPM}-{MAX_BPM}", doc.bpm),
        ));
    }

    check_progression(&doc.chords.progression, &mut out);

    if !(MIN_FILTER..=MAX_FILTER).contains(&doc.chords.filter) {
        out.push(Violation::new(
            "chords.filter",
            format!("{} Hz is outside {MIN_FILTER}-{MAX_FILTER}", doc.chords.filter),
        ));
    }

    check_melody_notes(&doc.melody.notes, &mut out);

    let delay = doc.melody.delay;
    if !delay.is_finite() || !(0.0..=1.0).contains(&delay) {
        out.push(Violation::new(
            "melody.delay",
            format!("{delay} is outside 0.0-1.0"),
        ));
    }

    if let Some(drums) = &doc.drums {
        check_drums(drums, &mut out);
    }

    out
}

/// Validate and convert the result into an error
///
/// # Errors
/// Returns all violations when the document is not persistable.
pub fn check(doc: &PatternDocument) -> Result<(), ValidationError> {
    let violations = validate(doc);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn check_progression(progression: &[Vec<String>], out: &mut Vec<Violation>) {
    if progression.is_empty() {
        out.push(Violation::new("chords.progression", "must contain at least one chord"));
    }

    for (i, chord) in progression.iter().enumerate() {
        if chord.is_empty() || chord.len() > MAX_CHORD_NOTES {
            out.push(Violation::new(
                format!("chords.progression[{i}]"),
                format!("has {} notes, expected 1-{MAX_CHORD_NOTES}", chord.len()),
            ));
        }

        for (j, note) in chord.iter().enumerate() {
            let field = format!("chords.progression[{i}][{j}]");
            if is_rest(note) {
                out.push(Violation::new(field, "rest marker is only allowed in melody notes"));
            } else if let Err(e) = NoteName::parse(note) {
                out.push(Violation::new(field, e.to_string()));
            }
        }
    }
}

fn check_melody_notes(notes: &[String], out: &mut Vec<Violation>) {
    if notes.is_empty() {
        out.push(Violation::new("melody.notes", "must contain at least one note or rest"));
    }

    for (i, note) in notes.iter().enumerate() {
        if is_rest(note) {
            continue;
        }
        if let Err(e) = NoteName::parse(note) {
            out.push(Violation::new(format!("melody.notes[{i}]"), e.to_string()));
        }
    }
}

fn check_drums(drums: &DrumSection, out: &mut Vec<Violation>) {
    check_steps("drums.kick", &drums.kick, out);
    check_steps("drums.snare", &drums.snare, out);

    if drums.kick.len() != drums.snare.len() {
        out.push(Violation::new(
            "drums",
            format!(
                "kick has {} steps but snare has {}",
                drums.kick.len(),
                drums.snare.len()
            ),
        ));
    }

    if let Some(hihat) = &drums.hihat {
        check_steps("drums.hihat", hihat, out);
    }
}

fn check_steps(field: &str, steps: &[u8], out: &mut Vec<Violation>) {
    if steps.is_empty() {
        out.push(Violation::new(field, "must contain at least one step"));
        return;
    }

    let bad: Vec<String> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| **s > 1)
        .map(|(i, s)| format!("{s} at step {i}"))
        .collect();
    if !bad.is_empty() {
        out.push(Violation::new(
            field,
            format!("steps must be 0 or 1, found {}", bad.join(", ")),
        ));
    }
}
