//! Error types for the change queue
//!
//! Provides error handling for:
//! - Queue operations (add, cancel)
//! - Mutation capability failures and timeouts
//! - Per-change execution failures
//! - Configuration loading

use crate::types::ChangeId;
use pattern_model::ValidationError;
use pattern_store::{ParseError, StoreError};
use std::path::PathBuf;
use std::time::Duration;

/// Queue operation errors
///
/// All variants are caller-correctable; none affects queued records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// No pending record with this id
    #[error("change {0} not found")]
    NotFound(ChangeId),

    /// The record's execution time has passed or it is executing
    #[error("change {0} has already fired")]
    AlreadyFired(ChangeId),

    /// Description outside the accepted length
    #[error("description must be {min}-{max} characters, got {len}")]
    InvalidDescription { len: usize, min: usize, max: usize },

    /// Negative, non-finite or oversized delay
    #[error("invalid delay: {0}")]
    InvalidDelay(String),
}

impl QueueError {
    /// Check if the caller can fix the request and retry
    #[inline]
    #[must_use]
    pub fn is_caller_correctable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::AlreadyFired(_)
                | Self::InvalidDescription { .. }
                | Self::InvalidDelay(_)
        )
    }

    /// Check if the record exists but can no longer be cancelled
    #[inline]
    #[must_use]
    pub fn is_already_fired(&self) -> bool {
        matches!(self, Self::AlreadyFired(_))
    }
}

/// Error returned by a mutation capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The capability declined or could not produce a document
    #[error("no usable document: {0}")]
    NoDocument(String),

    /// The capability itself failed
    #[error("capability failed: {0}")]
    Failed(String),
}

/// Failure of the fallback path
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    /// No capability was configured
    #[error("no mutation capability configured")]
    Unavailable,

    /// The capability returned an error
    #[error(transparent)]
    Capability(#[from] MutationError),

    /// The capability did not answer in time
    #[error("mutation capability timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The capability task panicked or was aborted
    #[error("mutation capability aborted: {0}")]
    Aborted(String),
}

impl FallbackError {
    /// Check if the capability timed out
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Why one change failed; recorded as text on the record
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Reading, parsing or writing the live file failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Substitution produced text that no longer parses
    #[error("substituted text does not parse: {0}")]
    Substitution(#[source] ParseError),

    /// The document to be written is invalid
    #[error("resulting document is invalid: {0}")]
    Invalid(#[from] ValidationError),

    /// The fallback path failed
    #[error("fallback failed: {0}")]
    Fallback(#[from] FallbackError),

    /// A blocking store task panicked or was cancelled
    #[error("store task did not complete: {0}")]
    Interrupted(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not valid TOML for the configuration schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_errors_are_caller_correctable() {
        let id = ChangeId(3);
        assert!(QueueError::NotFound(id).is_caller_correctable());
        assert!(QueueError::AlreadyFired(id).is_already_fired());
        assert_eq!(QueueError::NotFound(id).to_string(), "change 3 not found");
    }

    #[test]
    fn timeout_is_detected() {
        let err = FallbackError::Timeout(Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "mutation capability timed out after 1.5s");
        assert!(!FallbackError::Unavailable.is_timeout());
    }

    #[test]
    fn execution_error_wraps_fallback() {
        let err = ExecutionError::from(FallbackError::from(MutationError::Failed("offline".into())));
        assert_eq!(err.to_string(), "fallback failed: capability failed: offline");
    }
}
