//! Retry and backoff scenarios.

use std::sync::Arc;
use std::time::Duration;

use convhub_core::ErrorKind;
use convhub_entity::{ConversionKind, CreateJob, JobStatus};
use convhub_worker::TaskKind;

use crate::helpers::{BACKOFF_BASE, MAX_RETRIES, ScriptedConverter, Step, TestHub};

fn request() -> CreateJob {
    CreateJob::new(ConversionKind::AudioExtract, "mp4", "mp3")
}

#[tokio::test]
async fn test_transient_twice_then_success() {
    let converter = Arc::new(ScriptedConverter::with_script([
        Step::Transient,
        Step::Transient,
    ]));
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(request(), b"video").await;
    hub.orchestrator.start(id).await.unwrap();

    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempt_count, 1);
    assert_eq!(job.progress_percent, 0);
    assert_eq!(job.current_stage, "retrying in 100ms");
    assert_eq!(job.last_error.as_ref().unwrap().kind, ErrorKind::Transient);

    let tasks = hub.orchestrator.scheduled_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Retry);
    assert_eq!(Some(tasks[0].due_at), job.retry_at);

    // Not due yet.
    let report = hub.advance(BACKOFF_BASE - Duration::from_millis(1)).await;
    assert_eq!(report.retries_resumed, 0);
    assert_eq!(
        hub.orchestrator.get_status(id).await.unwrap().status,
        JobStatus::Pending
    );

    let report = hub.advance(Duration::from_millis(1)).await;
    assert_eq!(report.retries_resumed, 1);
    let job = hub.settle(id).await;
    assert_eq!(job.attempt_count, 2);
    assert_eq!(job.current_stage, "retrying in 200ms");

    hub.advance(BACKOFF_BASE * 2).await;
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempt_count, 2);
    assert_eq!(job.progress_percent, 100);
    assert_eq!(converter.calls(), 3);
}

#[tokio::test]
async fn test_retries_exhausted() {
    let converter = Arc::new(ScriptedConverter::always(Step::Transient));
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(request(), b"video").await;
    hub.orchestrator.start(id).await.unwrap();

    let mut job = hub.settle(id).await;
    while job.status == JobStatus::Pending {
        hub.advance(BACKOFF_BASE * (1 << job.attempt_count)).await;
        job = hub.settle(id).await;
    }

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt_count, MAX_RETRIES);
    assert_eq!(job.last_error.as_ref().unwrap().kind, ErrorKind::Transient);
    assert!(job.retry_at.is_none());
    assert_eq!(converter.calls(), MAX_RETRIES as usize + 1);

    let tasks = hub.orchestrator.scheduled_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].kind, TaskKind::Cleanup);
    assert_eq!(
        tasks[0].due_at,
        job.completed_at.unwrap() + chrono::Duration::days(1)
    );
}

#[tokio::test]
async fn test_start_is_rejected_while_waiting_to_retry() {
    let converter = Arc::new(ScriptedConverter::with_script([Step::Transient]));
    let hub = TestHub::new(converter);
    let id = hub.submit(request(), b"video").await;
    hub.orchestrator.start(id).await.unwrap();
    hub.settle(id).await;

    let err = hub.orchestrator.start(id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
}
