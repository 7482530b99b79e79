//! Pattern file persistence
//!
//! Reads and writes the live pattern file:
//! - Parser for the object-literal text format with field-level errors
//! - Canonical renderer with a header comment (description and timestamp)
//! - Atomic, serialized writes with a single-generation backup
//!
//! # Example
//!
//! ```rust,ignore
//! use pattern_store::PatternStore;
//!
//! let store = PatternStore::new("patterns.js");
//! let mut doc = store.read()?;
//! doc.bpm = 20;
//! store.write(&doc, "slow down")?;
//! ```

mod decode;
pub mod error;
pub mod header;
pub mod render;
pub mod store;
mod syntax;

pub use decode::parse_document;
pub use error::{ParseError, RenderError, StoreError, WriteError};
pub use header::PatternHeader;
pub use render::render;
pub use store::{PatternStore, WriteOptions, BACKUP_SUFFIX};
