//! Scheduler: fires due changes against the live file
//!
//! A single loop wakes on a fixed tick (and early when a change is added),
//! claims every due record and executes them one at a time in
//! (`execute_at`, `id`) order. Each record ends `executed` or `failed`;
//! no error escapes the per-record boundary.

use crate::capability::MutationCapability;
use crate::config::PatternConfig;
use crate::error::{ExecutionError, FallbackError};
use crate::queue::{ChangeQueue, Outcome};
use crate::types::{ChangeRecord, ExecutionMethod};
use chrono::Utc;
use pattern_model::PatternDocument;
use pattern_store::{parse_document, PatternStore, StoreError, WriteOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Executes due changes from a queue against a store
pub struct Scheduler {
    queue: Arc<ChangeQueue>,
    store: Arc<PatternStore>,
    capability: Option<Arc<dyn MutationCapability>>,
    tick: Duration,
    fallback_timeout: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("store", &self.store.path())
            .field("has_capability", &self.capability.is_some())
            .field("tick", &self.tick)
            .field("fallback_timeout", &self.fallback_timeout)
            .finish_non_exhaustive()
    }
}

/// Failure of one change, with the path reached before it failed
struct Failure {
    via: Option<ExecutionMethod>,
    error: ExecutionError,
}

impl Failure {
    fn on(via: ExecutionMethod) -> impl FnOnce(ExecutionError) -> Self {
        move |error| Self {
            via: Some(via),
            error,
        }
    }
}

impl From<StoreError> for Failure {
    fn from(e: StoreError) -> Self {
        Self {
            via: None,
            error: e.into(),
        }
    }
}

impl Scheduler {
    /// Create scheduler without a mutation capability
    ///
    /// Changes whose `find` text is absent then fail with
    /// `FallbackError::Unavailable`.
    #[must_use]
    pub fn new(queue: Arc<ChangeQueue>, store: Arc<PatternStore>, config: &PatternConfig) -> Self {
        Self {
            queue,
            store,
            capability: None,
            tick: config.tick_interval(),
            fallback_timeout: config.fallback_timeout(),
        }
    }

    /// With mutation capability for the fallback path
    #[must_use]
    pub fn with_capability(mut self, capability: Arc<dyn MutationCapability>) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Queue this scheduler drains
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    /// Execute every change due now
    ///
    /// Returns the records in the order they were executed, each terminal.
    pub async fn run_due(&self) -> Vec<ChangeRecord> {
        let due = self.queue.claim_due(Utc::now());
        if due.is_empty() {
            return Vec::new();
        }
        tracing::debug!(count = due.len(), "Executing due changes");

        let mut done = Vec::with_capacity(due.len());
        for record in due {
            let outcome = self.execute(&record).await;
            if let Some(finished) = self.queue.complete(record.id, outcome) {
                done.push(finished);
            }
        }
        done
    }

    async fn execute(&self, record: &ChangeRecord) -> Outcome {
        match self.apply(record).await {
            Ok(via) => {
                tracing::info!(id = %record.id, via = ?via, "Change executed: {}", record.description);
                Outcome::Executed(via)
            }
            Err(Failure { via, error }) => {
                tracing::warn!(id = %record.id, via = ?via, "Change failed: {}", error);
                Outcome::Failed {
                    via,
                    cause: error.to_string(),
                }
            }
        }
    }

    async fn apply(&self, record: &ChangeRecord) -> Result<ExecutionMethod, Failure> {
        let text = self.on_store(PatternStore::read_raw).await?;

        let (doc, via) = if !record.find.is_empty() && text.contains(&record.find) {
            let via = ExecutionMethod::Substitution;
            let updated = text.replacen(&record.find, &record.replace, 1);
            let doc = parse_document(&updated)
                .map_err(ExecutionError::Substitution)
                .map_err(Failure::on(via))?;
            (doc, via)
        } else {
            tracing::debug!(id = %record.id, "Find text absent, using fallback");
            let via = ExecutionMethod::Fallback;
            let current = parse_document(&text)
                .map_err(|e| ExecutionError::Store(e.into()))
                .map_err(Failure::on(via))?;
            let doc = self
                .fallback(&record.description, &current)
                .await
                .map_err(|e| Failure::on(via)(e.into()))?;
            (doc, via)
        };

        pattern_model::check(&doc).map_err(|e| Failure::on(via)(e.into()))?;

        // An edit that landed since `text` was read wins; this change fails
        let description = record.description.clone();
        self.on_store(move |store| {
            store.write_if_unchanged(
                &text,
                &doc,
                &description,
                WriteOptions::default().with_skip_validation(true),
            )
        })
        .await
        .map_err(|e| Failure { via: Some(via), ..e })?;
        Ok(via)
    }

    /// Run blocking store I/O off the async workers
    async fn on_store<T, F>(&self, op: F) -> Result<T, Failure>
    where
        F: FnOnce(&PatternStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || op(&store)).await {
            Ok(result) => Ok(result?),
            Err(join) => Err(Failure {
                via: None,
                error: ExecutionError::Interrupted(join.to_string()),
            }),
        }
    }

    /// Ask the capability for a document, bounded by the fallback timeout
    ///
    /// The call runs in its own task so a panicking or hung capability cannot
    /// stall the loop; on timeout the task is aborted.
    async fn fallback(
        &self,
        description: &str,
        current: &PatternDocument,
    ) -> Result<PatternDocument, FallbackError> {
        let capability = self.capability.clone().ok_or(FallbackError::Unavailable)?;
        let description = description.to_string();
        let current = current.clone();

        let task = tokio::spawn(async move { capability.propose(&description, &current).await });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.fallback_timeout, task).await {
            Ok(Ok(proposed)) => Ok(proposed?),
            Ok(Err(join)) => Err(FallbackError::Aborted(join.to_string())),
            Err(_) => {
                abort.abort();
                Err(FallbackError::Timeout(self.fallback_timeout))
            }
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(tick = ?self.tick, "Scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.queue.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            self.run_due().await;
        }

        tracing::info!("Scheduler stopped");
    }

    /// Run on a background task
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        SchedulerHandle { shutdown, task }
    }
}

/// Handle to a spawned scheduler loop
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it; a change mid-execution finishes first
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    /// Check if the loop has exited
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MutationError;
    use crate::types::ChangeStatus;
    use async_trait::async_trait;
    use pattern_model::{ChordSection, MelodySection, TimeInterval, Waveform};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn doc(bpm: i64) -> PatternDocument {
        PatternDocument {
            bpm,
            chords: ChordSection {
                progression: vec![vec!["C3".into(), "E3".into(), "G3".into()]],
                interval: TimeInterval::TwoMeasures,
                duration: TimeInterval::TwoMeasures,
                filter: 400,
            },
            melody: MelodySection {
                notes: vec!["E4".into(), "~".into()],
                interval: TimeInterval::EighthNote,
                duration: TimeInterval::EighthNote,
                waveform: Waveform::Sine,
                delay: 0.25,
            },
            drums: None,
        }
    }

    struct Fixed {
        bpm: i64,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MutationCapability for Fixed {
        async fn propose(
            &self,
            _description: &str,
            current: &PatternDocument,
        ) -> Result<PatternDocument, MutationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PatternDocument {
                bpm: self.bpm,
                ..current.clone()
            })
        }
    }

    struct Hang;

    #[async_trait]
    impl MutationCapability for Hang {
        async fn propose(
            &self,
            _description: &str,
            _current: &PatternDocument,
        ) -> Result<PatternDocument, MutationError> {
            std::future::pending().await
        }
    }

    struct Panics;

    #[async_trait]
    impl MutationCapability for Panics {
        async fn propose(
            &self,
            _description: &str,
            _current: &PatternDocument,
        ) -> Result<PatternDocument, MutationError> {
            panic!("capability bug")
        }
    }

    /// Edits the live file itself while proposing, like a concurrent writer
    struct EditsWhileProposing {
        store: Arc<PatternStore>,
    }

    #[async_trait]
    impl MutationCapability for EditsWhileProposing {
        async fn propose(
            &self,
            _description: &str,
            current: &PatternDocument,
        ) -> Result<PatternDocument, MutationError> {
            self.store
                .write(&doc(60), "edited meanwhile")
                .map_err(|e| MutationError::Failed(e.to_string()))?;
            Ok(PatternDocument {
                bpm: 45,
                ..current.clone()
            })
        }
    }

    fn setup() -> (TempDir, Arc<ChangeQueue>, Arc<PatternStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(PatternStore::new(dir.path().join("patterns.js")));
        store.write(&doc(30), "Initial pattern").unwrap();
        (dir, Arc::new(ChangeQueue::default()), store)
    }

    fn config() -> PatternConfig {
        PatternConfig::new()
            .with_tick_interval_ms(10)
            .with_fallback_timeout_secs(1)
    }

    fn add(queue: &ChangeQueue, find: &str, replace: &str) -> ChangeRecord {
        queue
            .add(find, replace, Duration::ZERO, Some("test change".into()))
            .unwrap()
    }

    #[tokio::test]
    async fn substitution_rewrites_file() {
        let (_dir, queue, store) = setup();
        let scheduler = Scheduler::new(queue.clone(), store.clone(), &config());
        let r = add(&queue, "bpm: 30", "bpm: 20");

        let done = scheduler.run_due().await;
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, r.id);
        assert_eq!(done[0].status, ChangeStatus::Executed);
        assert_eq!(done[0].executed_via, Some(ExecutionMethod::Substitution));
        assert_eq!(store.read().unwrap().bpm, 20);
        assert_eq!(
            store.read_header().unwrap().description.as_deref(),
            Some("test change")
        );
    }

    #[tokio::test]
    async fn invalid_substitution_fails_without_writing() {
        let (_dir, queue, store) = setup();
        let before = store.read_raw().unwrap();
        let scheduler = Scheduler::new(queue.clone(), store.clone(), &config());
        add(&queue, "bpm: 30", "bpm: 300");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert!(done[0].failure.as_deref().unwrap().contains("bpm"));
        assert_eq!(store.read_raw().unwrap(), before);
    }

    #[tokio::test]
    async fn broken_substitution_is_a_failure() {
        let (_dir, queue, store) = setup();
        let scheduler = Scheduler::new(queue.clone(), store.clone(), &config());
        add(&queue, "bpm: 30,", "bpm: 30");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert!(done[0]
            .failure
            .as_deref()
            .unwrap()
            .starts_with("substituted text does not parse"));
    }

    #[tokio::test]
    async fn missing_capability_fails_fallback() {
        let (_dir, queue, store) = setup();
        let scheduler = Scheduler::new(queue.clone(), store, &config());
        add(&queue, "nonexistent-token", "x");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert_eq!(done[0].executed_via, Some(ExecutionMethod::Fallback));
        assert_eq!(
            done[0].failure.as_deref(),
            Some("fallback failed: no mutation capability configured")
        );
    }

    #[tokio::test]
    async fn fallback_document_is_written() {
        let (_dir, queue, store) = setup();
        let capability = Arc::new(Fixed {
            bpm: 45,
            calls: AtomicUsize::new(0),
        });
        let scheduler =
            Scheduler::new(queue.clone(), store.clone(), &config()).with_capability(capability.clone());
        add(&queue, "nonexistent-token", "x");
        add(&queue, "", "empty find goes to fallback");

        let done = scheduler.run_due().await;
        assert!(done.iter().all(|r| r.status == ChangeStatus::Executed));
        assert!(done
            .iter()
            .all(|r| r.executed_via == Some(ExecutionMethod::Fallback)));
        assert_eq!(capability.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.read().unwrap().bpm, 45);
    }

    #[tokio::test]
    async fn invalid_fallback_document_is_rejected() {
        let (_dir, queue, store) = setup();
        let before = store.read_raw().unwrap();
        let capability = Arc::new(Fixed {
            bpm: 500,
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(queue.clone(), store.clone(), &config()).with_capability(capability);
        add(&queue, "nonexistent-token", "x");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert!(done[0].failure.as_deref().unwrap().contains("invalid"));
        assert_eq!(store.read_raw().unwrap(), before);
    }

    #[tokio::test]
    async fn concurrent_edit_is_not_overwritten() {
        let (_dir, queue, store) = setup();
        let capability = Arc::new(EditsWhileProposing {
            store: store.clone(),
        });
        let scheduler =
            Scheduler::new(queue.clone(), store.clone(), &config()).with_capability(capability);
        add(&queue, "nonexistent-token", "x");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert_eq!(done[0].executed_via, Some(ExecutionMethod::Fallback));
        assert!(done[0].failure.as_deref().unwrap().contains("changed since it was read"));
        assert_eq!(store.read().unwrap().bpm, 60);
        assert_eq!(
            store.read_header().unwrap().description.as_deref(),
            Some("edited meanwhile")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_capability_times_out() {
        let (_dir, queue, store) = setup();
        let scheduler = Scheduler::new(queue.clone(), store, &config()).with_capability(Arc::new(Hang));
        add(&queue, "nonexistent-token", "x");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert!(done[0].failure.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn panicking_capability_is_contained() {
        let (_dir, queue, store) = setup();
        let scheduler = Scheduler::new(queue.clone(), store, &config()).with_capability(Arc::new(Panics));
        add(&queue, "nonexistent-token", "x");

        let done = scheduler.run_due().await;
        assert_eq!(done[0].status, ChangeStatus::Failed);
        assert!(done[0].failure.as_deref().unwrap().contains("aborted"));
    }

    #[tokio::test]
    async fn spawned_loop_executes_and_stops() {
        let (_dir, queue, store) = setup();
        let scheduler = Arc::new(Scheduler::new(queue.clone(), store.clone(), &config()));
        let handle = scheduler.spawn();

        let r = add(&queue, "bpm: 30", "bpm: 25");
        for _ in 0..200 {
            if queue.get(r.id).is_some_and(|r| r.status.is_terminal()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.get(r.id).unwrap().status, ChangeStatus::Executed);
        assert_eq!(store.read().unwrap().bpm, 25);

        handle.shutdown().await;
    }
}
