//! Change queue
//!
//! Owns every `ChangeRecord` for the life of the process. Mutations (add,
//! cancel, claim, complete) take the registry's write lock; listing takes the
//! read lock and may run concurrently with itself.

use crate::error::QueueError;
use crate::types::{AddChangeRequest, ChangeId, ChangeRecord, ChangeStatus, ExecutionMethod};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Shortest accepted description, in characters
pub const MIN_DESCRIPTION_CHARS: usize = 5;
/// Longest accepted description, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 200;
/// Terminal records kept for `list_all` unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Final result of executing a claimed change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Written to the live file
    Executed(ExecutionMethod),
    /// Abandoned with a cause
    Failed {
        /// Path that was attempted, if one was reached
        via: Option<ExecutionMethod>,
        /// Cause text
        cause: String,
    },
}

#[derive(Debug, Default)]
struct Registry {
    next_id: u64,
    records: BTreeMap<ChangeId, ChangeRecord>,
    in_flight: BTreeSet<ChangeId>,
}

impl Registry {
    fn prune(&mut self, limit: usize) {
        let terminal: Vec<ChangeId> = self
            .records
            .values()
            .filter(|r| r.status.is_terminal())
            .map(|r| r.id)
            .collect();
        let excess = terminal.len().saturating_sub(limit);
        for id in &terminal[..excess] {
            self.records.remove(id);
        }
    }
}

/// Shared registry of delayed changes
#[derive(Debug)]
pub struct ChangeQueue {
    registry: RwLock<Registry>,
    wake: Notify,
    history_limit: usize,
}

impl Default for ChangeQueue {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ChangeQueue {
    /// Create queue retaining at most `history_limit` terminal records
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            wake: Notify::new(),
            history_limit,
        }
    }

    /// Queue a change due `delay` from now
    ///
    /// Returns the stored record without waiting for execution. A missing
    /// description defaults to a summary of the substitution.
    ///
    /// # Errors
    /// Returns `QueueError::InvalidDescription` for a description outside
    /// 5-200 characters, or `QueueError::InvalidDelay` if the execution time
    /// is not representable.
    pub fn add(
        &self,
        find: impl Into<String>,
        replace: impl Into<String>,
        delay: Duration,
        description: Option<String>,
    ) -> Result<ChangeRecord, QueueError> {
        let find = find.into();
        let replace = replace.into();
        let description = match description {
            Some(d) => check_description(d)?,
            None => default_description(&find, &replace),
        };

        let offset = chrono::Duration::from_std(delay)
            .map_err(|_| QueueError::InvalidDelay(format!("{delay:?} is too large")))?;
        let created_at = Utc::now();
        let execute_at = created_at
            .checked_add_signed(offset)
            .ok_or_else(|| QueueError::InvalidDelay(format!("{delay:?} is too large")))?;

        let record = {
            let mut reg = self.registry.write();
            reg.next_id += 1;
            let record = ChangeRecord {
                id: ChangeId(reg.next_id),
                find,
                replace,
                description,
                created_at,
                execute_at,
                status: ChangeStatus::Scheduled,
                executed_via: None,
                failure: None,
                finished_at: None,
            };
            reg.records.insert(record.id, record.clone());
            record
        };

        tracing::info!(
            id = %record.id,
            execute_at = %record.execute_at,
            "Change scheduled: {}",
            record.description
        );
        self.wake.notify_one();
        Ok(record)
    }

    /// Queue a change from a request
    ///
    /// # Errors
    /// As [`ChangeQueue::add`]; a negative or non-finite `delay_seconds` is
    /// `QueueError::InvalidDelay`.
    pub fn add_request(&self, request: &AddChangeRequest) -> Result<ChangeRecord, QueueError> {
        let delay = delay_from_secs(request.delay_seconds)?;
        self.add(
            request.find.clone(),
            request.replace.clone(),
            delay,
            request.description.clone(),
        )
    }

    /// Snapshot of one record
    #[must_use]
    pub fn get(&self, id: ChangeId) -> Option<ChangeRecord> {
        self.registry.read().records.get(&id).cloned()
    }

    /// Scheduled records ordered by execution time, then id
    #[must_use]
    pub fn list_pending(&self) -> Vec<ChangeRecord> {
        self.snapshot(ChangeRecord::is_pending)
    }

    /// Every retained record ordered by execution time, then id
    #[must_use]
    pub fn list_all(&self) -> Vec<ChangeRecord> {
        self.snapshot(|_| true)
    }

    /// Number of scheduled records
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry
            .read()
            .records
            .values()
            .filter(|r| r.is_pending())
            .count()
    }

    /// Withdraw a pending change
    ///
    /// # Errors
    /// Returns `QueueError::AlreadyFired` once the execution time has passed
    /// or the record is executing or finished, whether or not it was
    /// cancelled before. Returns `QueueError::NotFound` if no such record
    /// exists, or it was cancelled and its execution time is still ahead.
    pub fn cancel(&self, id: ChangeId) -> Result<ChangeRecord, QueueError> {
        let now = Utc::now();
        let mut reg = self.registry.write();
        let in_flight = reg.in_flight.contains(&id);

        let record = reg.records.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        match record.status {
            ChangeStatus::Executed | ChangeStatus::Failed => {
                return Err(QueueError::AlreadyFired(id))
            }
            _ if in_flight || record.execute_at <= now => return Err(QueueError::AlreadyFired(id)),
            ChangeStatus::Cancelled => return Err(QueueError::NotFound(id)),
            ChangeStatus::Scheduled => {}
        }

        record.status = ChangeStatus::Cancelled;
        record.finished_at = Some(now);
        let cancelled = record.clone();
        reg.prune(self.history_limit);
        drop(reg);

        tracing::info!(id = %id, "Change cancelled");
        Ok(cancelled)
    }

    /// Claim every scheduled record due at `now`, in execution order
    ///
    /// Claimed records are in flight: they can no longer be cancelled and are
    /// not claimed again until completed.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Vec<ChangeRecord> {
        let mut reg = self.registry.write();
        let mut due: Vec<ChangeRecord> = reg
            .records
            .values()
            .filter(|r| r.is_pending() && r.execute_at <= now && !reg.in_flight.contains(&r.id))
            .cloned()
            .collect();
        due.sort_by_key(ChangeRecord::order_key);
        reg.in_flight.extend(due.iter().map(|r| r.id));
        due
    }

    /// Record the outcome of a claimed change
    ///
    /// Returns the updated record, or `None` if the id is unknown.
    pub fn complete(&self, id: ChangeId, outcome: Outcome) -> Option<ChangeRecord> {
        let mut reg = self.registry.write();
        reg.in_flight.remove(&id);
        let record = reg.records.get_mut(&id)?;
        if record.status.is_terminal() {
            return Some(record.clone());
        }

        match outcome {
            Outcome::Executed(via) => {
                record.status = ChangeStatus::Executed;
                record.executed_via = Some(via);
            }
            Outcome::Failed { via, cause } => {
                record.status = ChangeStatus::Failed;
                record.executed_via = via;
                record.failure = Some(cause);
            }
        }
        record.finished_at = Some(Utc::now());
        let done = record.clone();
        reg.prune(self.history_limit);
        Some(done)
    }

    /// Earliest execution time among unclaimed scheduled records
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        let reg = self.registry.read();
        reg.records
            .values()
            .filter(|r| r.is_pending() && !reg.in_flight.contains(&r.id))
            .map(|r| r.execute_at)
            .min()
    }

    /// Future resolving when a change is added
    pub fn notified(&self) -> Notified<'_> {
        self.wake.notified()
    }

    fn snapshot(&self, keep: impl Fn(&ChangeRecord) -> bool) -> Vec<ChangeRecord> {
        let mut out: Vec<ChangeRecord> = self
            .registry
            .read()
            .records
            .values()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        out.sort_by_key(ChangeRecord::order_key);
        out
    }
}

/// Description used when a request omits one
#[must_use]
pub fn default_description(find: &str, replace: &str) -> String {
    format!("Replace '{find}' with '{replace}'")
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect()
}

fn check_description(description: String) -> Result<String, QueueError> {
    let trimmed = description.trim();
    let len = trimmed.chars().count();
    if (MIN_DESCRIPTION_CHARS..=MAX_DESCRIPTION_CHARS).contains(&len) {
        Ok(trimmed.to_string())
    } else {
        Err(QueueError::InvalidDescription {
            len,
            min: MIN_DESCRIPTION_CHARS,
            max: MAX_DESCRIPTION_CHARS,
        })
    }
}

/// Convert a delay in seconds, rejecting negative and non-finite values
///
/// # Errors
/// Returns `QueueError::InvalidDelay`.
pub fn delay_from_secs(seconds: f64) -> Result<Duration, QueueError> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| QueueError::InvalidDelay(format!("{seconds} is not a non-negative number of seconds")))
}
