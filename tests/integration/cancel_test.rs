//! Cancellation scenarios.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use convhub_core::ErrorKind;
use convhub_entity::{ConversionKind, CreateJob, JobStatus};

use crate::helpers::{BACKOFF_BASE, ScriptedConverter, Step, TestHub};

fn request() -> CreateJob {
    CreateJob::new(ConversionKind::FormatTranscode, "wav", "mp3")
}

#[tokio::test]
async fn test_cancel_during_conversion_discards_result() {
    let gate = Arc::new(Semaphore::new(0));
    let converter = Arc::new(ScriptedConverter::new().gated(gate.clone()));
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(request(), b"RIFF").await;
    hub.orchestrator.start(id).await.unwrap();

    for _ in 0..1000 {
        if converter.calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(converter.calls(), 1);

    let job = hub.orchestrator.cancel(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.artifacts_purged);

    // Let the in-flight conversion finish; its result must be dropped.
    gate.add_permits(1);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let job = hub.orchestrator.get_status(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.output_refs.is_empty());
    assert_eq!(hub.artifacts.len(), 0);
    assert_eq!(hub.orchestrator.cache_stats().entry_count, 0);
}

#[tokio::test]
async fn test_cancel_while_waiting_to_retry() {
    let converter = Arc::new(ScriptedConverter::with_script([Step::Transient]));
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(request(), b"RIFF").await;
    hub.orchestrator.start(id).await.unwrap();
    assert_eq!(hub.settle(id).await.status, JobStatus::Pending);

    let job = hub.orchestrator.cancel(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(hub.orchestrator.scheduled_tasks().is_empty());

    let report = hub.advance(BACKOFF_BASE * 10).await;
    assert_eq!(report.retries_resumed, 0);
    assert_eq!(converter.calls(), 1);
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let id = hub.submit(request(), b"RIFF").await;

    let first = hub.orchestrator.cancel(id).await.unwrap();
    let second = hub.orchestrator.cancel(id).await.unwrap();
    assert_eq!(first.status, JobStatus::Cancelled);
    assert_eq!(second.status, JobStatus::Cancelled);
    assert_eq!(first.completed_at, second.completed_at);

    assert_eq!(
        hub.orchestrator.start(id).await.unwrap_err().kind,
        ErrorKind::InvalidState
    );
}
