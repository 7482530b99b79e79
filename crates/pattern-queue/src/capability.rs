//! Mutation capability seam
//!
//! The scheduler consults a capability when a change's literal `find` text
//! is absent from the live file. Implementations wrap whatever can turn a
//! free-text description into a new document; retry policy, if any, belongs
//! to the implementation.

use crate::error::MutationError;
use async_trait::async_trait;
use pattern_model::PatternDocument;

/// Proposes a whole new document for a described change
#[async_trait]
pub trait MutationCapability: Send + Sync {
    /// Propose a document implementing `description` on top of `current`
    ///
    /// The result is validated by the caller before it is written.
    ///
    /// # Errors
    /// Returns `MutationError` if no usable document can be produced.
    async fn propose(
        &self,
        description: &str,
        current: &PatternDocument,
    ) -> Result<PatternDocument, MutationError>;
}
