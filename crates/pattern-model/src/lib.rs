//! Pattern document model
//!
//! Typed representation of the pattern an external player polls and renders:
//! - Tempo, chord progression, melody and optional percussion
//! - Fixed note-name grammar (`NoteName`)
//! - Pure validator returning every violation at once
//! - Descriptive analysis of a document
//!
//! # Example
//!
//! ```rust,ignore
//! use pattern_model::{validate, PatternDocument};
//!
//! let violations = validate(&doc);
//! if violations.is_empty() {
//!     store.write(&doc, "slow down")?;
//! }
//! ```

pub mod analysis;
pub mod document;
pub mod note;
pub mod validate;

pub use analysis::{summarize, DrumSummary, PatternSummary};
pub use document::{
    Chord, ChordSection, DrumSection, MelodySection, PatternDocument, TimeInterval, UnknownVariant,
    Waveform,
};
pub use note::{Accidental, NoteError, NoteName, REST};
pub use validate::{check, validate, ValidationError, Violation};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
