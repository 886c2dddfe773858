//! Shared test helpers for integration tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::sync::Semaphore;

use convhub_cache::ConversionCache;
use convhub_core::traits::{Converter, ConverterError, ManualClock};
use convhub_core::types::{ConversionOptions, Format, JobId};
use convhub_database::MemoryJobRepository;
use convhub_entity::{CreateJob, Job, JobStatus};
use convhub_realtime::ProgressChannel;
use convhub_storage::MemoryArtifactStore;
use convhub_worker::{
    DueTaskReport, EtaEstimator, JobOrchestrator, OrchestratorDeps, RetentionPolicy, RetryPolicy,
};

/// Backoff unit used by every test hub.
pub const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Retries allowed by every test hub.
pub const MAX_RETRIES: u32 = 3;

/// One scripted converter outcome.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Return `converted:` followed by the input.
    Succeed,
    /// Fail like a crashed external process.
    Transient,
    /// Reject the input as corrupt.
    Malformed,
    /// Panic inside the converter.
    Panic,
}

/// A converter that plays back a script, then succeeds forever.
#[derive(Debug, Default)]
pub struct ScriptedConverter {
    script: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn always(step: Step) -> Self {
        Self::with_script(std::iter::repeat_n(step, 32))
    }

    /// Block every call until the test adds a permit to `gate`.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Converter for ScriptedConverter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn convert(
        &self,
        _source: &Format,
        _target: &Format,
        input: Bytes,
        _options: &ConversionOptions,
    ) -> Result<Bytes, ConverterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Succeed);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        match step {
            Step::Succeed => Ok(Bytes::from([b"converted:".as_slice(), &input].concat())),
            Step::Transient => Err(ConverterError::ProcessFailed {
                tool: "scripted".to_string(),
                status: 1,
                stderr: "device busy".to_string(),
            }),
            Step::Malformed => Err(ConverterError::MalformedInput("corrupt header".to_string())),
            Step::Panic => panic!("codec bug"),
        }
    }
}

/// An orchestrator over in-memory stores and a manual clock.
pub struct TestHub {
    pub orchestrator: JobOrchestrator,
    pub clock: Arc<ManualClock>,
    pub jobs: Arc<MemoryJobRepository>,
    pub artifacts: Arc<MemoryArtifactStore>,
}

impl TestHub {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self::with_cache_limit(converter, 1024 * 1024)
    }

    pub fn with_cache_limit(converter: Arc<dyn Converter>, max_cache_bytes: u64) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let jobs = Arc::new(MemoryJobRepository::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let deps = OrchestratorDeps {
            jobs: jobs.clone(),
            artifacts: artifacts.clone(),
            converter,
            cache: ConversionCache::new(max_cache_bytes, Duration::from_secs(3600), clock.clone()),
            progress: ProgressChannel::new(256),
            clock: clock.clone(),
        };
        let orchestrator = JobOrchestrator::new(
            deps,
            RetryPolicy {
                max_retries: MAX_RETRIES,
                backoff_base: BACKOFF_BASE,
            },
            RetentionPolicy::default(),
            EtaEstimator::default(),
        );
        Self {
            orchestrator,
            clock,
            jobs,
            artifacts,
        }
    }

    /// Create a job and upload one input.
    pub async fn submit(&self, request: CreateJob, input: &[u8]) -> JobId {
        let id = self.orchestrator.create(request).await.unwrap().job_id;
        self.orchestrator
            .upload_input(id, Bytes::copy_from_slice(input))
            .await
            .unwrap();
        id
    }

    /// Poll the job until `pred` holds.
    pub async fn wait_until(&self, id: JobId, pred: impl Fn(&Job) -> bool) -> Job {
        for _ in 0..1000 {
            let job = self.orchestrator.get_status(id).await.unwrap();
            if pred(&job) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} did not reach the expected state");
    }

    /// Wait until the current attempt has finished: the job is terminal or
    /// waiting out a backoff.
    pub async fn settle(&self, id: JobId) -> Job {
        self.wait_until(id, |job| {
            job.is_terminal() || (job.status == JobStatus::Pending && job.retry_at.is_some())
        })
        .await
    }

    /// Move the clock forward and fire whatever became due.
    pub async fn advance(&self, by: Duration) -> DueTaskReport {
        self.clock.advance(by);
        self.orchestrator.run_due_tasks().await
    }

    /// Output payloads of a completed job.
    pub async fn outputs(&self, job: &Job) -> Vec<Bytes> {
        let mut out = Vec::new();
        for id in &job.output_refs {
            out.push(self.orchestrator.load_artifact(id).await.unwrap());
        }
        out
    }
}

/// Encode a solid PNG.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([200, 40, 40, 255]),
    ));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}
