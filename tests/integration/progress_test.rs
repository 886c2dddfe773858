//! Progress event scenarios.

use std::sync::Arc;

use convhub_entity::{ConversionKind, CreateJob, JobStatus};
use convhub_realtime::ProgressEvent;

use crate::helpers::{BACKOFF_BASE, ScriptedConverter, Step, TestHub};

fn request() -> CreateJob {
    CreateJob::new(ConversionKind::FormatTranscode, "png", "webp")
}

#[tokio::test]
async fn test_events_follow_stages_and_end_terminal() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let id = hub.submit(request(), b"img").await;
    let mut ui = hub.orchestrator.subscribe(id).await.unwrap();
    let mut monitor = hub.orchestrator.subscribe(id).await.unwrap();

    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;

    let events = ui.drain();
    assert_eq!(events.len(), monitor.drain().len());
    let stages: Vec<&str> = events.iter().map(|e| e.current_stage.as_str()).collect();
    assert_eq!(
        stages,
        [
            "starting",
            "validating inputs",
            "checking route",
            "checking cache",
            "converting",
            "storing output",
            "completed",
        ]
    );
    assert!(
        events
            .windows(2)
            .all(|w| w[0].progress_percent <= w[1].progress_percent)
    );

    let last = events.last().unwrap();
    assert!(last.terminal);
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.progress_percent, 100);
    assert_eq!(last.download_refs, job.output_refs);
    assert!(events[..events.len() - 1].iter().all(|e| !e.terminal));
}

#[tokio::test]
async fn test_retry_event_resets_progress() {
    let converter = Arc::new(ScriptedConverter::with_script([Step::Transient]));
    let hub = TestHub::new(converter);
    let id = hub.submit(request(), b"img").await;
    let mut sub = hub.orchestrator.subscribe(id).await.unwrap();

    hub.orchestrator.start(id).await.unwrap();
    hub.settle(id).await;
    hub.advance(BACKOFF_BASE).await;
    hub.settle(id).await;

    let events = sub.drain();
    let retry: Vec<&ProgressEvent> = events.iter().filter(|e| e.retrying).collect();
    assert_eq!(retry.len(), 1);
    assert_eq!(retry[0].progress_percent, 0);
    assert_eq!(retry[0].attempt_count, 1);
    assert!(!retry[0].terminal);
    assert!(retry[0].error.is_some());

    // Progress never goes backwards within one attempt.
    for pair in events.windows(2) {
        if pair[0].attempt_count == pair[1].attempt_count {
            assert!(pair[0].progress_percent <= pair[1].progress_percent);
        }
    }
    assert_eq!(events.last().unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_batch_subscription_sees_every_member() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let mut batch = hub.orchestrator.subscribe_batch("nightly").unwrap();

    let a = hub.submit(request().in_batch("nightly"), b"a").await;
    let b = hub.submit(request().in_batch("nightly"), b"b").await;
    let outsider = hub.submit(request(), b"c").await;
    for id in [a, b, outsider] {
        hub.orchestrator.start(id).await.unwrap();
        hub.settle(id).await;
    }

    let events = batch.drain();
    let terminal: Vec<_> = events.iter().filter(|e| e.terminal).map(|e| e.job_id).collect();
    assert_eq!(terminal.len(), 2);
    assert!(terminal.contains(&a) && terminal.contains(&b));
    assert!(events.iter().all(|e| e.job_id != outsider));
    assert!(events.iter().all(|e| e.batch_id.as_deref() == Some("nightly")));
}

#[tokio::test]
async fn test_unsubscribed_handle_gets_nothing() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let id = hub.submit(request(), b"img").await;
    let mut sub = hub.orchestrator.subscribe(id).await.unwrap();
    assert!(hub.orchestrator.unsubscribe(sub.id()));

    hub.orchestrator.start(id).await.unwrap();
    hub.settle(id).await;
    assert!(sub.drain().is_empty());
}
