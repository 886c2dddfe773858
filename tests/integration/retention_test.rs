//! Deferred cleanup and retention sweep scenarios.

use std::sync::Arc;
use std::time::Duration;

use convhub_core::ErrorKind;
use convhub_core::traits::Clock;
use convhub_entity::{ConversionKind, CreateJob, JobStatus};
use convhub_worker::RetentionSweeper;

use crate::helpers::{ScriptedConverter, Step, TestHub};

const HOUR: Duration = Duration::from_secs(3600);

fn request() -> CreateJob {
    CreateJob::new(ConversionKind::FormatTranscode, "odt", "docx")
}

#[tokio::test]
async fn test_completed_artifacts_purged_after_two_hours() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let id = hub.submit(request(), b"doc").await;
    hub.orchestrator.start(id).await.unwrap();
    hub.settle(id).await;
    assert_eq!(hub.artifacts.len(), 2);

    let report = hub.advance(2 * HOUR - Duration::from_secs(1)).await;
    assert_eq!(report.cleanups_run, 0);
    assert_eq!(hub.artifacts.len(), 2);

    let report = hub.advance(Duration::from_secs(1)).await;
    assert_eq!(report.cleanups_run, 1);
    assert_eq!(hub.artifacts.len(), 0);

    let job = hub.orchestrator.get_status(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.artifacts_purged);
    assert_eq!(job.output_refs.len(), 1);
}

#[tokio::test]
async fn test_failed_artifacts_kept_for_a_day() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::always(Step::Malformed)));
    let id = hub.submit(request(), b"doc").await;
    hub.orchestrator.start(id).await.unwrap();
    assert_eq!(hub.settle(id).await.status, JobStatus::Failed);

    assert_eq!(hub.advance(12 * HOUR).await.cleanups_run, 0);
    assert_eq!(hub.artifacts.len(), 1);
    assert_eq!(hub.advance(12 * HOUR).await.cleanups_run, 1);
    assert_eq!(hub.artifacts.len(), 0);
}

#[tokio::test]
async fn test_sweep_removes_old_terminal_jobs() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let done = hub.submit(request(), b"doc").await;
    hub.orchestrator.start(done).await.unwrap();
    hub.settle(done).await;
    let waiting = hub.submit(request(), b"later").await;

    let sweeper = RetentionSweeper::new(
        hub.jobs.clone(),
        hub.artifacts.clone(),
        hub.clock.clone(),
        24 * HOUR,
    );
    assert_eq!(sweeper.sweep().await.unwrap().jobs_removed, 0);

    hub.clock.advance(25 * HOUR);
    let report = sweeper.sweep_once(hub.clock.now()).await.unwrap();
    assert_eq!(report.jobs_removed, 1);
    assert_eq!(report.artifacts_removed, 2);

    assert_eq!(
        hub.orchestrator.get_status(done).await.unwrap_err().kind,
        ErrorKind::NotFound
    );
    let pending = hub.orchestrator.get_status(waiting).await.unwrap();
    assert_eq!(pending.status, JobStatus::Pending);
    assert_eq!(hub.artifacts.len(), 1);

    // A cleanup firing after the sweep finds nothing left to do.
    let report = hub.orchestrator.run_due_tasks().await;
    assert_eq!(report.cleanups_run, 1);
}
