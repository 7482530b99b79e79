//! Service facade over store, queue and scheduler
//!
//! Exposes the request/response operations a transport layer needs without
//! binding to any transport.

use crate::capability::MutationCapability;
use crate::config::PatternConfig;
use crate::error::QueueError;
use crate::queue::ChangeQueue;
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::types::{
    AddChangeRequest, AddChangeResponse, CancelResponse, ChangeId, ChangeRecord, ChangeStatus,
    ListResponse,
};
use pattern_model::{summarize, PatternDocument, PatternSummary};
use pattern_store::{PatternHeader, PatternStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Pattern editing service
#[derive(Debug)]
pub struct PatternService {
    store: Arc<PatternStore>,
    queue: Arc<ChangeQueue>,
    scheduler: Arc<Scheduler>,
    config: PatternConfig,
}

impl PatternService {
    /// Create service from configuration, without a mutation capability
    #[must_use]
    pub fn new(config: PatternConfig) -> Self {
        Self::build(config, None)
    }

    /// Create service whose fallback path uses `capability`
    #[must_use]
    pub fn with_capability(config: PatternConfig, capability: Arc<dyn MutationCapability>) -> Self {
        Self::build(config, Some(capability))
    }

    fn build(config: PatternConfig, capability: Option<Arc<dyn MutationCapability>>) -> Self {
        let store = Arc::new(PatternStore::new(&config.pattern_path));
        let queue = Arc::new(ChangeQueue::new(config.history_limit));
        let mut scheduler = Scheduler::new(queue.clone(), store.clone(), &config);
        if let Some(capability) = capability {
            scheduler = scheduler.with_capability(capability);
        }
        Self {
            store,
            queue,
            scheduler: Arc::new(scheduler),
            config,
        }
    }

    /// Store backing this service
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    /// Queue backing this service
    #[inline]
    #[must_use]
    pub fn queue(&self) -> &Arc<ChangeQueue> {
        &self.queue
    }

    /// Scheduler backing this service
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// Start the scheduler loop in the background
    pub fn start(&self) -> SchedulerHandle {
        self.scheduler.clone().spawn()
    }

    /// Queue a change
    ///
    /// # Errors
    /// Returns `QueueError` for an invalid delay or description.
    pub fn schedule(&self, request: &AddChangeRequest) -> Result<AddChangeResponse, QueueError> {
        let record = self.queue.add_request(request)?;
        Ok(AddChangeResponse::from(&record))
    }

    /// Pending changes, earliest first
    #[must_use]
    pub fn pending(&self) -> ListResponse {
        ListResponse::from(self.queue.list_pending())
    }

    /// Every retained change, earliest first
    #[must_use]
    pub fn history(&self) -> Vec<ChangeRecord> {
        self.queue.list_all()
    }

    /// Cancel a pending change
    ///
    /// # Errors
    /// Returns `QueueError::NotFound` or `QueueError::AlreadyFired`.
    pub fn cancel(&self, id: ChangeId) -> Result<CancelResponse, QueueError> {
        let record = self.queue.cancel(id)?;
        Ok(CancelResponse {
            status: ChangeStatus::Cancelled,
            id: record.id,
        })
    }

    /// Write `doc` now, bypassing the queue
    ///
    /// # Errors
    /// Returns `StoreError::Validation` with every violation, or a write
    /// error; the live file is unchanged on error.
    pub fn apply_now(&self, doc: &PatternDocument, description: &str) -> Result<(), StoreError> {
        self.store.write(doc, description)
    }

    /// Current document
    ///
    /// # Errors
    /// Returns `StoreError` if the file cannot be read or parsed.
    pub fn current(&self) -> Result<PatternDocument, StoreError> {
        self.store.read()
    }

    /// Header of the live file
    ///
    /// # Errors
    /// Returns `StoreError::Read` if the file cannot be read.
    pub fn header(&self) -> Result<PatternHeader, StoreError> {
        self.store.read_header()
    }

    /// Analysis of the current document
    ///
    /// # Errors
    /// As [`PatternService::current`].
    pub fn summary(&self) -> Result<PatternSummary, StoreError> {
        Ok(summarize(&self.current()?))
    }

    /// Wait until change `id` is terminal, polling once per tick
    ///
    /// Requires a running scheduler (see [`PatternService::start`]). Returns
    /// `None` if the record is unknown or `limit` elapses first.
    pub async fn wait_for(&self, id: ChangeId, limit: Duration) -> Option<ChangeRecord> {
        let poll = async {
            loop {
                match self.queue.get(id) {
                    Some(record) if record.status.is_terminal() => return Some(record),
                    Some(_) => tokio::time::sleep(self.config.tick_interval()).await,
                    None => return None,
                }
            }
        };
        tokio::time::timeout(limit, poll).await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pattern_model::{ChordSection, MelodySection, TimeInterval, Waveform};
    use tempfile::TempDir;

    fn doc(bpm: i64) -> PatternDocument {
        PatternDocument {
            bpm,
            chords: ChordSection {
                progression: vec![vec!["D3".into(), "F3".into(), "A3".into()]],
                interval: TimeInterval::OneMeasure,
                duration: TimeInterval::OneMeasure,
                filter: 450,
            },
            melody: MelodySection {
                notes: vec!["~".into(), "A4".into()],
                interval: TimeInterval::EighthNote,
                duration: TimeInterval::EighthNote,
                waveform: Waveform::Sine,
                delay: 0.0,
            },
            drums: None,
        }
    }

    fn service() -> (TempDir, PatternService) {
        let dir = TempDir::new().unwrap();
        let config = PatternConfig::new()
            .with_pattern_path(dir.path().join("patterns.js"))
            .with_tick_interval_ms(10);
        let service = PatternService::new(config);
        service.apply_now(&doc(30), "Initial pattern").unwrap();
        (dir, service)
    }

    #[test]
    fn schedule_list_cancel() {
        let (_dir, service) = service();
        let resp = service
            .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 20").with_delay(60.0))
            .unwrap();
        assert_eq!(resp.status, ChangeStatus::Scheduled);

        let list = service.pending();
        assert_eq!(list.total_count, 1);
        assert_eq!(list.pending[0].id, resp.id);

        let cancelled = service.cancel(resp.id).unwrap();
        assert_eq!(cancelled.status, ChangeStatus::Cancelled);
        assert_eq!(service.pending().total_count, 0);
        assert_eq!(service.history().len(), 1);
    }

    #[test]
    fn apply_now_reports_all_violations() {
        let (_dir, service) = service();
        let mut bad = doc(500);
        bad.chords.filter = 10;
        let err = service.apply_now(&bad, "too much").unwrap_err();
        match err {
            StoreError::Validation(v) => assert_eq!(v.fields(), vec!["bpm", "chords.filter"]),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(service.current().unwrap().bpm, 30);
    }

    #[test]
    fn summary_describes_current_document() {
        let (_dir, service) = service();
        let summary = service.summary().unwrap();
        assert_eq!(summary.bpm, 30);
        assert_eq!(summary.tempo_description, "Very Slow - Meditative");
        assert_eq!(
            service.header().unwrap().description.as_deref(),
            Some("Initial pattern")
        );
    }

    #[tokio::test]
    async fn started_service_executes_changes() {
        let (_dir, service) = service();
        let handle = service.start();

        let resp = service
            .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 20").with_description("slow down"))
            .unwrap();
        let record = service
            .wait_for(resp.id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(record.status, ChangeStatus::Executed);
        assert_eq!(service.current().unwrap().bpm, 20);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn wait_for_unknown_id_is_none() {
        let (_dir, service) = service();
        assert!(service.wait_for(ChangeId(99), Duration::from_millis(50)).await.is_none());
    }
}
