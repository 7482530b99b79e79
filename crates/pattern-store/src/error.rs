//! Error types for the pattern store
//!
//! Provides error handling for:
//! - Parse operations (file text → document)
//! - Render operations (document → file text)
//! - Write operations (backup, temp file, atomic replace)

use pattern_model::ValidationError;
use std::path::PathBuf;

/// Longest fragment quoted in a parse error
const FRAGMENT_LIMIT: usize = 40;

/// Errors turning file text into a document
///
/// A parse failure never modifies any file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Text does not follow the object-literal grammar
    #[error("syntax error at line {line}, column {column}: {message} (near `{fragment}`)")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
        fragment: String,
    },

    /// A required key is absent
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    /// A key the grammar does not define
    #[error("unexpected field `{field}` at line {line}")]
    UnknownField { field: String, line: usize },

    /// The same key twice in one object
    #[error("duplicate field `{field}` at line {line}")]
    DuplicateField { field: String, line: usize },

    /// Well-formed value of the wrong shape
    #[error("invalid value for `{field}` at line {line}: {message} (found `{fragment}`)")]
    InvalidValue {
        field: String,
        line: usize,
        message: String,
        fragment: String,
    },
}

impl ParseError {
    /// Create syntax error at byte offset `at` of `source`
    pub fn syntax(source: &str, at: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_col(source, at);
        Self::Syntax {
            line,
            column,
            message: message.into(),
            fragment: fragment(source, at, source.len()),
        }
    }

    /// Field path the error refers to, if any
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Syntax { .. } => None,
            Self::MissingField { field }
            | Self::UnknownField { field, .. }
            | Self::DuplicateField { field, .. }
            | Self::InvalidValue { field, .. } => Some(field),
        }
    }
}

/// 1-based line and column of byte offset `at`
pub(crate) fn line_col(source: &str, at: usize) -> (usize, usize) {
    let at = floor_boundary(source, at.min(source.len()));
    let before = &source[..at];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

/// Source text between two offsets, clipped for display
pub(crate) fn fragment(source: &str, start: usize, end: usize) -> String {
    let start = floor_boundary(source, start.min(source.len()));
    let end = floor_boundary(source, end.min(source.len())).max(start);
    let text = source[start..end].trim();
    let clipped: String = text.chars().take(FRAGMENT_LIMIT).collect();
    let clipped = clipped.lines().next().unwrap_or_default().to_string();
    if clipped.len() < text.len() {
        format!("{clipped}...")
    } else {
        clipped
    }
}

fn floor_boundary(s: &str, mut at: usize) -> usize {
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}

/// Errors turning a document into file text
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    /// NaN or infinity cannot be written as a literal
    #[error("cannot render non-finite number {value} for `{field}`")]
    NonFinite { field: &'static str, value: f64 },
}

/// Errors during a write; the live file is untouched in every case
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Copying the live file to the backup failed
    #[error("backup of {path} failed: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rendering failed
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    /// Creating, filling or flushing the temporary file failed
    #[error("temporary file in {dir} failed: {source}")]
    TempFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temporary file over the live file failed
    #[error("atomic replace of {path} failed: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Live file could not be read
    #[error("io error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Live file text is malformed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Document rejected before touching disk
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Persisting failed
    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    /// Live file changed between read and conditional write
    #[error("{path} changed since it was read")]
    Conflict { path: PathBuf },
}

impl StoreError {
    /// Create read error for path
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Check if the on-disk text failed to parse
    #[inline]
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Check if the error was raised by validation
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if a conditional write lost to a newer edit
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the failed operation may have changed anything on disk
    ///
    /// Only a failed write after the backup step can have replaced the
    /// backup file; the live file is never modified by a failure.
    #[inline]
    #[must_use]
    pub fn touched_disk(&self) -> bool {
        matches!(
            self,
            Self::Write(WriteError::TempFile { .. } | WriteError::Replace { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let src = "ab\ncde\nf";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, src.len()), (3, 2));
    }

    #[test]
    fn fragment_is_clipped() {
        let src = "x".repeat(100);
        let frag = fragment(&src, 0, 100);
        assert!(frag.ends_with("..."));
        assert_eq!(frag.len(), FRAGMENT_LIMIT + 3);
    }

    #[test]
    fn syntax_error_display_includes_location() {
        let err = ParseError::syntax("({\n  bpm: ?\n})", 10, "unexpected character '?'");
        let text = err.to_string();
        assert!(text.contains("line 2, column 8"));
        assert!(text.contains("`?"));
        assert!(err.field().is_none());
    }

    #[test]
    fn store_error_classification() {
        let parse = StoreError::from(ParseError::MissingField {
            field: "bpm".to_string(),
        });
        assert!(parse.is_parse());
        assert!(!parse.touched_disk());

        let replace = StoreError::from(WriteError::Replace {
            path: PathBuf::from("patterns.js"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        });
        assert!(replace.touched_disk());
        assert!(!replace.is_validation());
    }
}
