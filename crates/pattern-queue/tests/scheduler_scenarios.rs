//! End-to-end scenarios: queue, scheduler and store against a real file

use pattern_queue::{
    AddChangeRequest, ChangeId, ChangeRecord, ChangeStatus, ExecutionMethod, PatternService,
    QueueError, Scheduler,
};
use pattern_store::parse_document;
use pattern_test_utils::{
    sample_document, sample_text, CountingCapability, FailingCapability, HangingCapability,
    TempPattern,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn wait_terminal(service: &PatternService, id: ChangeId) -> ChangeRecord {
    service
        .wait_for(id, Duration::from_secs(10))
        .await
        .expect("change did not finish")
}

#[tokio::test]
async fn delayed_substitution_slows_the_tempo() {
    let pattern = TempPattern::new();
    let service = pattern.service();
    let handle = service.start();

    let resp = service
        .schedule(
            &AddChangeRequest::new("bpm: 30", "bpm: 20")
                .with_delay(1.0)
                .with_description("slow down"),
        )
        .unwrap();
    assert_eq!(resp.status, ChangeStatus::Scheduled);

    // not yet due
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.current().unwrap().bpm, 30);

    let record = wait_terminal(&service, resp.id).await;
    assert_eq!(record.status, ChangeStatus::Executed);
    assert_eq!(record.executed_via, Some(ExecutionMethod::Substitution));
    assert!(record.finished_at.unwrap() >= record.execute_at);
    assert_eq!(service.current().unwrap().bpm, 20);

    let header = service.header().unwrap();
    assert_eq!(header.description.as_deref(), Some("slow down"));

    handle.shutdown().await;
}

#[tokio::test]
async fn zero_delay_runs_without_further_triggers() {
    let pattern = TempPattern::new();
    let service = pattern.service();
    let handle = service.start();

    let resp = service
        .schedule(&AddChangeRequest::new("filter: 400", "filter: 800"))
        .unwrap();
    let record = wait_terminal(&service, resp.id).await;
    assert_eq!(record.status, ChangeStatus::Executed);
    assert_eq!(record.description, "Replace 'filter: 400' with 'filter: 800'");
    assert_eq!(service.current().unwrap().chords.filter, 800);

    handle.shutdown().await;
}

#[tokio::test]
async fn cancellation_race() {
    let pattern = TempPattern::new();
    let service = pattern.service();
    let handle = service.start();

    let first = service
        .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 20").with_delay(0.5))
        .unwrap();
    assert!(service.cancel(first.id).is_ok());

    let second = service
        .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 25").with_delay(0.5))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        service.cancel(second.id),
        Err(QueueError::AlreadyFired(second.id))
    );

    let record = wait_terminal(&service, second.id).await;
    assert_eq!(record.status, ChangeStatus::Executed);
    assert_eq!(service.current().unwrap().bpm, 25);

    // the cancelled record never fired
    let cancelled = service.queue().get(first.id).unwrap();
    assert_eq!(cancelled.status, ChangeStatus::Cancelled);

    handle.shutdown().await;
}

#[tokio::test]
async fn cancelling_the_same_change_twice() {
    let pattern = TempPattern::new();
    let before = pattern.bytes();
    let service = pattern.service();
    let handle = service.start();

    let resp = service
        .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 20").with_delay(0.5))
        .unwrap();
    assert!(service.cancel(resp.id).is_ok());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(
        service.cancel(resp.id),
        Err(QueueError::AlreadyFired(resp.id))
    );
    assert_eq!(
        service.queue().get(resp.id).unwrap().status,
        ChangeStatus::Cancelled
    );
    assert_eq!(pattern.bytes(), before);

    handle.shutdown().await;
}

#[tokio::test]
async fn fallback_invoked_once_and_only_when_find_is_absent() {
    let pattern = TempPattern::new();
    let capability = CountingCapability::new(45);
    let service = pattern.service_with(capability.clone());
    let scheduler = service.scheduler().clone();

    let present = service
        .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 35"))
        .unwrap();
    scheduler.run_due().await;
    assert_eq!(capability.calls(), 0);
    assert_eq!(
        service.queue().get(present.id).unwrap().executed_via,
        Some(ExecutionMethod::Substitution)
    );

    let absent = service
        .schedule(
            &AddChangeRequest::new("nonexistent-token", "x").with_description("make it calmer"),
        )
        .unwrap();
    scheduler.run_due().await;
    scheduler.run_due().await;
    assert_eq!(capability.calls(), 1);

    let record = service.queue().get(absent.id).unwrap();
    assert_eq!(record.status, ChangeStatus::Executed);
    assert_eq!(record.executed_via, Some(ExecutionMethod::Fallback));
    assert_eq!(service.current().unwrap().bpm, 45);
}

#[tokio::test]
async fn fallback_timeout_marks_failed_and_later_changes_proceed() {
    let pattern = TempPattern::new();
    let before = pattern.bytes();
    let service = pattern.service_with(Arc::new(HangingCapability));
    let handle = service.start();

    let hung = service
        .schedule(&AddChangeRequest::new("nonexistent-token", "x"))
        .unwrap();
    let next = service
        .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 40").with_delay(0.1))
        .unwrap();

    let hung = wait_terminal(&service, hung.id).await;
    assert_eq!(hung.status, ChangeStatus::Failed);
    assert!(hung.failure.unwrap().contains("timed out"));

    let next = wait_terminal(&service, next.id).await;
    assert_eq!(next.status, ChangeStatus::Executed);
    assert_ne!(pattern.bytes(), before);
    assert_eq!(service.current().unwrap().bpm, 40);

    handle.shutdown().await;
}

#[tokio::test]
async fn failed_capability_leaves_file_untouched() {
    let pattern = TempPattern::new();
    let before = pattern.bytes();
    let service = pattern.service_with(Arc::new(FailingCapability));

    let resp = service
        .schedule(&AddChangeRequest::new("nonexistent-token", "x"))
        .unwrap();
    service.scheduler().run_due().await;

    let record = service.queue().get(resp.id).unwrap();
    assert_eq!(record.status, ChangeStatus::Failed);
    assert!(record.failure.unwrap().contains("cannot apply"));
    assert_eq!(pattern.bytes(), before);
}

#[tokio::test]
async fn same_time_changes_fire_in_id_order() {
    let pattern = TempPattern::new();
    let config = pattern.config();
    let queue = Arc::new(pattern_queue::ChangeQueue::default());
    let scheduler = Scheduler::new(queue.clone(), pattern.store.clone(), &config);

    // both target the same text; the first to fire wins, the second falls back
    let a = queue
        .add("bpm: 30", "bpm: 21", Duration::ZERO, Some("first change".into()))
        .unwrap();
    let b = queue
        .add("bpm: 30", "bpm: 22", Duration::ZERO, Some("second change".into()))
        .unwrap();

    let done = scheduler.run_due().await;
    let order: Vec<_> = done.iter().map(|r| r.id).collect();
    assert_eq!(order, vec![a.id, b.id]);
    assert_eq!(done[0].status, ChangeStatus::Executed);
    assert_eq!(done[1].status, ChangeStatus::Failed);
    assert_eq!(pattern.store.read().unwrap().bpm, 21);
}

#[tokio::test]
async fn hand_written_file_is_accepted_and_canonicalized() {
    let pattern = TempPattern::with_text(sample_text());
    assert_eq!(pattern.store.read().unwrap(), sample_document());

    let service = pattern.service();
    let resp = service
        .schedule(&AddChangeRequest::new("delay: 0.35", "delay: 0.5"))
        .unwrap();
    service.scheduler().run_due().await;

    assert_eq!(
        service.queue().get(resp.id).unwrap().status,
        ChangeStatus::Executed
    );
    let text = service.store().read_raw().unwrap();
    assert!(text.starts_with("// Ambient pattern (Tone.js format)\n"));
    let doc = parse_document(&text).unwrap();
    assert!((doc.melody.delay - 0.5).abs() < f64::EPSILON);

    let backup = std::fs::read_to_string(service.store().backup_path()).unwrap();
    assert_eq!(backup, sample_text());
}

#[tokio::test]
async fn malformed_file_fails_changes_without_writing() {
    let pattern = TempPattern::with_text("({ bpm: 30, chords: ");
    let service = pattern.service();

    let resp = service
        .schedule(&AddChangeRequest::new("bpm: 30", "bpm: 20"))
        .unwrap();
    service.scheduler().run_due().await;

    let record = service.queue().get(resp.id).unwrap();
    assert_eq!(record.status, ChangeStatus::Failed);
    assert_eq!(pattern.bytes(), b"({ bpm: 30, chords: ");
    assert!(!service.store().backup_path().exists());
}
