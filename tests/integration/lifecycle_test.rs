//! Job lifecycle scenarios.

use std::sync::Arc;

use bytes::Bytes;
use image::GenericImageView;

use convhub_converters::{ConverterRegistry, ImageConverter};
use convhub_core::ErrorKind;
use convhub_core::types::ArtifactId;
use convhub_entity::{ConversionKind, CreateJob, JobStatus};

use crate::helpers::{self, ScriptedConverter, Step, TestHub};

fn transcode() -> CreateJob {
    CreateJob::new(ConversionKind::FormatTranscode, "docx", "pdf")
}

#[tokio::test]
async fn test_image_resize_completes() {
    let registry = ConverterRegistry::new().register(Arc::new(ImageConverter::new()));
    let hub = TestHub::new(Arc::new(registry));

    let request = CreateJob::new(ConversionKind::ImageResize, "png", "jpg")
        .with_option("width", "50")
        .with_option("height", "40");
    let id = hub.submit(request, &helpers::png(100, 100)).await;
    let started = hub.orchestrator.start(id).await.unwrap();
    assert_eq!(started.status, JobStatus::Processing);
    assert!(started.started_at.is_some());

    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress_percent, 100);
    assert_eq!(job.output_refs.len(), 1);
    assert!(job.completed_at.is_some());
    assert_eq!(job.attempt_count, 0);

    let outputs = hub.outputs(&job).await;
    let decoded = image::load_from_memory(&outputs[0]).unwrap();
    assert_eq!(decoded.dimensions(), (50, 40));
}

#[tokio::test]
async fn test_start_without_input_is_rejected() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let id = hub.orchestrator.create(transcode()).await.unwrap().job_id;

    let err = hub.orchestrator.start(id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let job = hub.orchestrator.get_status(id).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.started_at.is_none());
}

#[tokio::test]
async fn test_inputs_only_attach_to_pending_jobs() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let converter = Arc::new(ScriptedConverter::new().gated(gate.clone()));
    let hub = TestHub::new(converter);
    let id = hub.submit(transcode(), b"doc").await;
    hub.orchestrator.start(id).await.unwrap();

    let err = hub
        .orchestrator
        .attach_input(id, vec![ArtifactId::new()])
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);
    let err = hub.orchestrator.start(id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidState);

    gate.add_permits(1);
    assert_eq!(hub.settle(id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_each_input_gets_its_own_output() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(transcode(), b"first").await;
    hub.orchestrator
        .upload_input(id, Bytes::from_static(b"second"))
        .await
        .unwrap();

    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(
        hub.outputs(&job).await,
        vec![
            Bytes::from_static(b"converted:first"),
            Bytes::from_static(b"converted:second"),
        ]
    );
    assert_eq!(converter.calls(), 2);
}

#[tokio::test]
async fn test_missing_input_artifact_is_fatal() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::new(converter.clone());
    let id = hub.orchestrator.create(transcode()).await.unwrap().job_id;
    hub.orchestrator
        .attach_input(id, vec![ArtifactId::new()])
        .await
        .unwrap();

    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt_count, 0);
    assert_eq!(job.last_error.unwrap().kind, ErrorKind::Validation);
    assert_eq!(converter.calls(), 0);
}

#[tokio::test]
async fn test_unsupported_pair_is_fatal() {
    let converter = Arc::new(ScriptedConverter::new());
    let hub = TestHub::new(converter.clone());
    let request = CreateJob::new(ConversionKind::FormatTranscode, "mp3", "docx");
    let id = hub.submit(request, b"ID3").await;

    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.last_error.unwrap().kind,
        ErrorKind::UnsupportedConversion
    );
    assert_eq!(converter.calls(), 0);
}

#[tokio::test]
async fn test_malformed_input_is_not_retried() {
    let converter = Arc::new(ScriptedConverter::always(Step::Malformed));
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(transcode(), b"garbage").await;

    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt_count, 0);
    let error = job.last_error.unwrap();
    assert_eq!(error.kind, ErrorKind::FatalConversion);
    assert!(error.message.contains("corrupt header"));
    assert_eq!(converter.calls(), 1);
}

#[tokio::test]
async fn test_converter_panic_fails_job() {
    let converter = Arc::new(ScriptedConverter::with_script([Step::Panic]));
    let hub = TestHub::new(converter.clone());
    let id = hub.submit(transcode(), b"doc").await;

    hub.orchestrator.start(id).await.unwrap();
    let job = hub.settle(id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempt_count, 0);
    assert_eq!(job.last_error.unwrap().kind, ErrorKind::Internal);
    assert!(job.output_refs.is_empty());
    assert_eq!(converter.calls(), 1);

    // The next job runs normally.
    let next = hub.submit(transcode(), b"doc").await;
    hub.orchestrator.start(next).await.unwrap();
    assert_eq!(hub.settle(next).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_terminal_state_is_final() {
    let hub = TestHub::new(Arc::new(ScriptedConverter::new()));
    let id = hub.submit(transcode(), b"doc").await;
    hub.orchestrator.start(id).await.unwrap();
    let done = hub.settle(id).await;
    assert_eq!(done.status, JobStatus::Completed);

    assert_eq!(
        hub.orchestrator.cancel(id).await.unwrap_err().kind,
        ErrorKind::InvalidState
    );
    assert_eq!(
        hub.orchestrator.start(id).await.unwrap_err().kind,
        ErrorKind::InvalidState
    );
    let after = hub.orchestrator.get_status(id).await.unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.completed_at, done.completed_at);
}
