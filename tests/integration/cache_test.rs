//! Result cache scenarios.

use std::sync::Arc;

use convhub_entity::{ConversionKind, CreateJob, JobStatus};

use crate::helpers::{ScriptedConverter, TestHub};

fn request() -> CreateJob {
    CreateJob::new(ConversionKind::FormatTranscode, "docx", "pdf").with_option("dpi", "150")
}

#[tokio::test]
async fn test_identical_request_hits_cache() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::new(converter.clone());

    let first = hub.submit(request(), b"quarterly report").await;
    hub.orchestrator.start(first).await.unwrap();
    let first = hub.settle(first).await;
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(converter.calls(), 1);

    let second = hub.submit(request(), b"quarterly report").await;
    hub.orchestrator.start(second).await.unwrap();
    let second = hub.settle(second).await;
    assert_eq!(second.status, JobStatus::Completed);
    assert_eq!(converter.calls(), 1);

    assert_ne!(first.output_refs, second.output_refs);
    assert_eq!(hub.outputs(&first).await, hub.outputs(&second).await);

    let stats = hub.orchestrator.cache_stats();
    assert_eq!(stats.entry_count, 1);
    assert_eq!(stats.total_size_bytes, "converted:quarterly report".len() as u64);
}

#[tokio::test]
async fn test_different_options_or_kind_miss() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::new(converter.clone());

    let base = hub.submit(request(), b"report").await;
    let other_option = hub
        .submit(request().with_option("dpi", "300"), b"report")
        .await;
    let other_kind = hub
        .submit(
            CreateJob::new(ConversionKind::DocumentRender, "docx", "pdf").with_option("dpi", "150"),
            b"report",
        )
        .await;

    for id in [base, other_option, other_kind] {
        hub.orchestrator.start(id).await.unwrap();
        assert_eq!(hub.settle(id).await.status, JobStatus::Completed);
    }
    assert_eq!(converter.calls(), 3);
    assert_eq!(hub.orchestrator.cache_stats().entry_count, 3);
}

#[tokio::test]
async fn test_oversized_result_still_completes() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::with_cache_limit(converter.clone(), 8);

    let id = hub.submit(request(), b"a payload well past the cap").await;
    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(hub.orchestrator.cache_stats().entry_count, 0);
}

#[tokio::test]
async fn test_concurrent_jobs_complete() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::new(converter.clone());

    let mut ids = Vec::new();
    for i in 0..8 {
        ids.push(hub.submit(request(), format!("doc {i}").as_bytes()).await);
    }
    let started = futures::future::join_all(ids.iter().map(|id| hub.orchestrator.start(*id))).await;
    assert!(started.iter().all(|r| r.is_ok()));

    for id in &ids {
        assert_eq!(hub.settle(*id).await.status, JobStatus::Completed);
    }
    assert_eq!(converter.calls(), 8);
    assert_eq!(hub.orchestrator.cache_stats().entry_count, 8);
}
