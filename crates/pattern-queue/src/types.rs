//! Change record and request/response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-unique change identifier, increasing in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(pub u64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a change; every status but `Scheduled` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Waiting for its execution time
    Scheduled,
    /// Applied to the live file
    Executed,
    /// Attempted and abandoned; see `ChangeRecord::failure`
    Failed,
    /// Withdrawn before firing
    Cancelled,
}

impl ChangeStatus {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Scheduled)
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Executed => "executed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an executed change reached the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMethod {
    /// Literal find/replace on the file text
    Substitution,
    /// Document proposed by the mutation capability
    Fallback,
}

/// A delayed edit request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Identifier
    pub id: ChangeId,
    /// Literal text to look for
    pub find: String,
    /// Replacement for the first occurrence of `find`
    pub replace: String,
    /// What the change is meant to do
    pub description: String,
    /// When the change was queued
    pub created_at: DateTime<Utc>,
    /// When the change becomes due
    pub execute_at: DateTime<Utc>,
    /// Current status
    pub status: ChangeStatus,
    /// Path taken, once executed or failed during fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_via: Option<ExecutionMethod>,
    /// Cause of a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// When the record became terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ChangeRecord {
    /// Check if the record is still waiting
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Scheduled
    }

    /// Ordering key: execution time, then id
    #[inline]
    #[must_use]
    pub fn order_key(&self) -> (DateTime<Utc>, ChangeId) {
        (self.execute_at, self.id)
    }
}

/// Request to queue a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChangeRequest {
    /// Literal text to look for
    pub find: String,
    /// Replacement text
    pub replace: String,
    /// Seconds from now until the change is due
    #[serde(default)]
    pub delay_seconds: f64,
    /// Optional description; defaults to a summary of the substitution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AddChangeRequest {
    /// Create request due immediately
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
            delay_seconds: 0.0,
            description: None,
        }
    }

    /// With delay in seconds
    #[inline]
    #[must_use]
    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = seconds;
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Response to an accepted change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChangeResponse {
    /// Assigned id
    pub id: ChangeId,
    /// When the change becomes due
    pub execute_at: DateTime<Utc>,
    /// Always `scheduled`
    pub status: ChangeStatus,
}

impl From<&ChangeRecord> for AddChangeResponse {
    fn from(record: &ChangeRecord) -> Self {
        Self {
            id: record.id,
            execute_at: record.execute_at,
            status: record.status,
        }
    }
}

/// Pending changes in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Scheduled records, earliest first
    pub pending: Vec<ChangeRecord>,
    /// Number of pending records
    pub total_count: usize,
}

impl From<Vec<ChangeRecord>> for ListResponse {
    fn from(pending: Vec<ChangeRecord>) -> Self {
        Self {
            total_count: pending.len(),
            pending,
        }
    }
}

/// Response to a successful cancellation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Always `cancelled`
    pub status: ChangeStatus,
    /// Cancelled record
    pub id: ChangeId,
}
