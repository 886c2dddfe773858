//! The job orchestrator.
//!
//! Owns every job state transition. Each mutation runs under a per-job lock
//! as load, modify, persist, publish, so subscribers only ever see states
//! that are already durable and a job is never written by two parties at
//! once.
//!
//! An attempt is identified by the job's `attempt_count` when it started.
//! An attempt may only write while the job is `processing` under that same
//! count; once the job is cancelled or handed to a newer attempt, the old
//! attempt's progress, results and failures are discarded.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use validator::Validate;

use convhub_cache::{CacheStats, ConversionCache, Fingerprint};
use convhub_core::config::AppConfig;
use convhub_core::error::{AppError, ErrorKind};
use convhub_core::result::AppResult;
use convhub_core::traits::{ArtifactStore, Clock, Converter};
use convhub_core::types::{ArtifactId, JobId, SubscriptionId};
use convhub_database::JobPersistence;
use convhub_entity::{CreateJob, Job, JobError, JobStatus};
use convhub_formats::ConversionRouter;
use convhub_realtime::{ProgressChannel, ProgressEvent, Subscription};

use crate::classify::classify;
use crate::policy::{EtaEstimator, RetentionPolicy, RetryPolicy};
use crate::scheduler::{ScheduledTask, TaskKind, TaskScheduler};

/// Collaborators the orchestrator drives.
#[derive(Debug, Clone)]
pub struct OrchestratorDeps {
    /// Job records.
    pub jobs: Arc<dyn JobPersistence>,
    /// Input and output payloads.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Conversion backend.
    pub converter: Arc<dyn Converter>,
    /// Result cache.
    pub cache: ConversionCache,
    /// Progress pub/sub.
    pub progress: ProgressChannel,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

/// Returned by [`JobOrchestrator::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedJob {
    /// New job id.
    pub job_id: JobId,
    /// Advertised completion estimate.
    pub estimated_completion: DateTime<Utc>,
}

/// What one pass over the delayed task queue did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DueTaskReport {
    /// Jobs put back into processing.
    pub retries_resumed: usize,
    /// Artifact cleanups performed.
    pub cleanups_run: usize,
}

#[derive(Debug)]
struct Inner {
    jobs: Arc<dyn JobPersistence>,
    artifacts: Arc<dyn ArtifactStore>,
    converter: Arc<dyn Converter>,
    cache: ConversionCache,
    progress: ProgressChannel,
    clock: Arc<dyn Clock>,
    router: ConversionRouter,
    scheduler: TaskScheduler,
    retry: RetryPolicy,
    retention: RetentionPolicy,
    eta: EtaEstimator,
    locks: DashMap<JobId, Arc<Mutex<()>>>,
}

/// Orchestrates conversion jobs from creation to cleanup.
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

/// `now + d`, saturating at the maximum representable instant.
fn after(now: DateTime<Utc>, d: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(d)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn owns(job: &Job, attempt: u32) -> bool {
    job.status == JobStatus::Processing && job.attempt_count == attempt
}

fn ensure_accepts_input(job: &Job) -> AppResult<()> {
    if job.status != JobStatus::Pending || job.started_at.is_some() {
        return Err(AppError::invalid_state(format!(
            "Job {} is {} and no longer accepts input",
            job.id, job.status
        )));
    }
    Ok(())
}

/// Progress while converting input `index` of `total`: spread over 30..90.
fn converting_progress(index: usize, total: usize) -> u8 {
    (30 + 60 * index / total.max(1)).min(90) as u8
}

fn converting_stage(index: usize, total: usize) -> String {
    if total == 1 {
        "converting".to_string()
    } else {
        format!("converting {}/{}", index + 1, total)
    }
}

/// Delete every artifact a job owns. Returns how many existed.
pub(crate) async fn delete_artifacts(store: &dyn ArtifactStore, job: &Job) -> AppResult<usize> {
    let mut removed = 0;
    for id in job.artifact_refs() {
        if store.delete(id).await? {
            removed += 1;
        }
    }
    Ok(removed)
}

impl JobOrchestrator {
    /// Create an orchestrator with explicit policies.
    pub fn new(
        deps: OrchestratorDeps,
        retry: RetryPolicy,
        retention: RetentionPolicy,
        eta: EtaEstimator,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: deps.jobs,
                artifacts: deps.artifacts,
                converter: deps.converter,
                cache: deps.cache,
                progress: deps.progress,
                clock: deps.clock,
                router: ConversionRouter::new(),
                scheduler: TaskScheduler::new(),
                retry,
                retention,
                eta,
                locks: DashMap::new(),
            }),
        }
    }

    /// Create an orchestrator with policies taken from configuration.
    pub fn from_config(deps: OrchestratorDeps, config: &AppConfig) -> Self {
        Self::new(
            deps,
            RetryPolicy::from_config(&config.worker),
            RetentionPolicy::from_config(&config.retention),
            EtaEstimator::from_config(&config.worker),
        )
    }

    // ── Public operations ───────────────────────────────────────────

    /// Register a new pending job.
    pub async fn create(&self, request: CreateJob) -> AppResult<CreatedJob> {
        request.validate()?;
        let now = self.inner.clock.now();
        let eta = self.inner.eta.estimate(request.kind, request.priority, now);
        let job = Job::new(&request, now, eta)?;
        self.inner.jobs.upsert(&job).await?;

        info!(
            job_id = %job.id,
            kind = %job.kind,
            priority = %job.priority,
            source = %job.source_format,
            target = %job.target_format,
            "Job created"
        );
        Ok(CreatedJob {
            job_id: job.id,
            estimated_completion: job.estimated_completion,
        })
    }

    /// Attach already stored artifacts as inputs of a pending job.
    pub async fn attach_input(&self, job_id: JobId, artifacts: Vec<ArtifactId>) -> AppResult<Job> {
        if artifacts.is_empty() {
            return Err(AppError::validation("No input artifacts given"));
        }
        let count = artifacts.len();
        let job = self
            .mutate(job_id, |job, now| {
                ensure_accepts_input(job)?;
                job.input_refs.extend(artifacts);
                job.updated_at = now;
                Ok(true)
            })
            .await?;
        debug!(job_id = %job_id, count, total = job.input_refs.len(), "Attached input artifacts");
        Ok(job)
    }

    /// Store `data` and attach it as an input of a pending job.
    pub async fn upload_input(&self, job_id: JobId, data: Bytes) -> AppResult<ArtifactId> {
        ensure_accepts_input(&self.load_job(job_id).await?)?;
        let id = self.inner.artifacts.save(data).await?;
        if let Err(e) = self.attach_input(job_id, vec![id]).await {
            if let Err(del) = self.inner.artifacts.delete(&id).await {
                warn!(artifact_id = %id, error = %del, "Failed to remove orphaned upload");
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Move a pending job to processing and launch its first attempt.
    pub async fn start(&self, job_id: JobId) -> AppResult<Job> {
        let job = self
            .mutate(job_id, |job, now| {
                if job.status != JobStatus::Pending {
                    return Err(AppError::invalid_state(format!(
                        "Job {} is {} and cannot be started",
                        job.id, job.status
                    )));
                }
                if job.retry_at.is_some() {
                    return Err(AppError::invalid_state(format!(
                        "Job {} is waiting to retry",
                        job.id
                    )));
                }
                if job.input_refs.is_empty() {
                    return Err(AppError::validation(format!(
                        "Job {} has no input artifacts",
                        job.id
                    )));
                }
                job.transition_to(JobStatus::Processing, now)?;
                job.set_progress(0, "starting", now);
                Ok(true)
            })
            .await?;

        info!(job_id = %job.id, inputs = job.input_refs.len(), "Job started");
        self.spawn_attempt(job.id, job.attempt_count);
        Ok(job)
    }

    /// Cancel a pending or processing job and purge its artifacts.
    ///
    /// Cancelling an already cancelled job returns it unchanged; completed
    /// and failed jobs cannot be cancelled.
    pub async fn cancel(&self, job_id: JobId) -> AppResult<Job> {
        let scheduler = &self.inner.scheduler;
        let mut cancelled = false;
        self.mutate(job_id, |job, now| {
            cancelled = job.cancel(now)?;
            if cancelled {
                scheduler.cancel(job.id, TaskKind::Retry);
            }
            Ok(cancelled)
        })
        .await?;

        if cancelled {
            info!(job_id = %job_id, "Job cancelled");
            if let Err(e) = self.cleanup(job_id).await {
                warn!(job_id = %job_id, error = %e, "Artifact cleanup after cancel failed");
            }
        }
        self.load_job(job_id).await
    }

    /// Current snapshot of a job.
    pub async fn get_status(&self, job_id: JobId) -> AppResult<Job> {
        self.load_job(job_id).await
    }

    /// Subscribe to progress events of one job.
    pub async fn subscribe(&self, job_id: JobId) -> AppResult<Subscription> {
        self.load_job(job_id).await?;
        self.inner.progress.subscribe(job_id)
    }

    /// Subscribe to progress events of every job in a batch.
    pub fn subscribe_batch(&self, batch_id: impl Into<String>) -> AppResult<Subscription> {
        self.inner.progress.subscribe_batch(batch_id)
    }

    /// Drop a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.progress.unsubscribe(id)
    }

    /// Read a stored artifact.
    pub async fn load_artifact(&self, id: &ArtifactId) -> AppResult<Bytes> {
        self.inner.artifacts.load(id).await
    }

    /// Result cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Retries and cleanups waiting in the delayed task queue.
    pub fn scheduled_tasks(&self) -> Vec<ScheduledTask> {
        self.inner.scheduler.pending()
    }

    /// Fire every delayed task that is due. Retries are resumed in the
    /// background; cleanups run inline.
    pub async fn run_due_tasks(&self) -> DueTaskReport {
        let now = self.inner.clock.now();
        let mut report = DueTaskReport::default();

        for task in self.inner.scheduler.take_due(now) {
            match task.kind {
                TaskKind::Retry => match self.resume(task.job_id).await {
                    Ok(true) => report.retries_resumed += 1,
                    Ok(false) => {}
                    Err(e) => error!(job_id = %task.job_id, error = %e, "Failed to resume job"),
                },
                TaskKind::Cleanup => match self.cleanup(task.job_id).await {
                    Ok(_) => report.cleanups_run += 1,
                    Err(e) => warn!(
                        job_id = %task.job_id,
                        error = %e,
                        "Artifact cleanup failed, leaving it to the retention sweep"
                    ),
                },
            }
        }
        report
    }

    /// Stop accepting subscriptions and close the open ones.
    pub fn shutdown(&self) {
        self.inner.progress.shutdown();
    }

    // ── State mutation ──────────────────────────────────────────────

    async fn lock_job(&self, id: JobId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.inner.locks.entry(id).or_default().value());
        lock.lock_owned().await
    }

    async fn load_job(&self, id: JobId) -> AppResult<Job> {
        self.inner
            .jobs
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }

    /// Load, modify, persist and publish under the job lock. `f` returns
    /// whether it changed the job; unchanged jobs are neither written nor
    /// published.
    async fn mutate<F>(&self, id: JobId, f: F) -> AppResult<Job>
    where
        F: FnOnce(&mut Job, DateTime<Utc>) -> AppResult<bool> + Send,
    {
        let _guard = self.lock_job(id).await;
        let result = self.mutate_locked(id, f).await;
        let retired = match &result {
            Ok(job) => job.is_terminal() && job.artifacts_purged,
            Err(e) => e.kind == ErrorKind::NotFound,
        };
        if retired {
            self.inner.locks.remove(&id);
        }
        result
    }

    async fn mutate_locked<F>(&self, id: JobId, f: F) -> AppResult<Job>
    where
        F: FnOnce(&mut Job, DateTime<Utc>) -> AppResult<bool> + Send,
    {
        let mut job = self.load_job(id).await?;
        let now = self.inner.clock.now();
        if f(&mut job, now)? {
            self.inner.jobs.upsert(&job).await?;
            self.inner
                .progress
                .publish(&ProgressEvent::from_job(&job, now));
        }
        Ok(job)
    }

    /// Report progress for `attempt`. Returns `None` once the attempt no
    /// longer owns the job.
    async fn advance(
        &self,
        job_id: JobId,
        attempt: u32,
        percent: u8,
        stage: String,
    ) -> AppResult<Option<Job>> {
        let mut owned = false;
        let job = self
            .mutate(job_id, |job, now| {
                if !owns(job, attempt) {
                    return Ok(false);
                }
                owned = true;
                job.set_progress(percent, stage, now);
                Ok(true)
            })
            .await?;
        Ok(owned.then_some(job))
    }

    // ── Attempts ────────────────────────────────────────────────────

    fn spawn_attempt(&self, job_id: JobId, attempt: u32) {
        let this = self.clone();
        tokio::spawn(async move {
            this.run_attempt(job_id, attempt).await;
        });
    }

    /// Run one attempt in its own task so a panic anywhere below it still
    /// fails the job.
    async fn run_attempt(&self, job_id: JobId, attempt: u32) {
        debug!(job_id = %job_id, attempt, "Attempt started");
        let this = self.clone();
        let outcome =
            tokio::spawn(async move { this.execute_attempt(job_id, attempt).await }).await;

        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(join) => {
                error!(job_id = %job_id, attempt, error = %join, "Attempt task aborted");
                AppError::internal(format!("Conversion attempt aborted: {join}"))
            }
        };
        if let Err(e) = self.handle_failure(job_id, attempt, err).await {
            error!(job_id = %job_id, error = %e, "Failed to record attempt failure");
        }
    }

    async fn execute_attempt(&self, job_id: JobId, attempt: u32) -> AppResult<()> {
        let inner = &self.inner;

        let Some(job) = self
            .advance(job_id, attempt, 10, "validating inputs".into())
            .await?
        else {
            return Ok(());
        };
        for input in &job.input_refs {
            if !inner.artifacts.exists(input).await? {
                return Err(AppError::validation(format!(
                    "Input artifact {input} not found"
                )));
            }
        }

        if self
            .advance(job_id, attempt, 20, "checking route".into())
            .await?
            .is_none()
        {
            return Ok(());
        }
        let route = inner.router.route(&job.source_format, &job.target_format)?;
        debug!(job_id = %job_id, operation = ?route.operation, "Route resolved");

        if self
            .advance(job_id, attempt, 30, "checking cache".into())
            .await?
            .is_none()
        {
            return Ok(());
        }

        let options = job.effective_options();
        let total = job.input_refs.len();
        let mut results = Vec::with_capacity(total);
        for (index, input) in job.input_refs.iter().enumerate() {
            let data = inner.artifacts.load(input).await.map_err(|e| {
                if e.kind == ErrorKind::NotFound {
                    AppError::validation(format!("Input artifact {input} not found"))
                } else {
                    e
                }
            })?;
            let fingerprint =
                Fingerprint::compute(&job.source_format, &job.target_format, &data, &options)?;
            if let Some(hit) = inner.cache.get(&fingerprint) {
                debug!(job_id = %job_id, input = %input, fingerprint = %fingerprint, "Cache hit");
                results.push(hit);
                continue;
            }

            if self
                .advance(
                    job_id,
                    attempt,
                    converting_progress(index, total),
                    converting_stage(index, total),
                )
                .await?
                .is_none()
            {
                return Ok(());
            }
            let output = inner
                .converter
                .convert(&job.source_format, &job.target_format, data, &options)
                .await
                .map_err(classify)?;

            {
                let _guard = self.lock_job(job_id).await;
                if !owns(&self.load_job(job_id).await?, attempt) {
                    debug!(job_id = %job_id, attempt, "Discarding result of superseded attempt");
                    return Ok(());
                }
                if let Err(e) = inner.cache.put(fingerprint, output.clone()) {
                    warn!(job_id = %job_id, error = %e, "Failed to cache conversion result");
                }
            }
            results.push(output);
        }

        if self
            .advance(job_id, attempt, 95, "storing output".into())
            .await?
            .is_none()
        {
            return Ok(());
        }
        let mut outputs = Vec::with_capacity(results.len());
        for payload in results {
            match inner.artifacts.save(payload).await {
                Ok(id) => outputs.push(id),
                Err(e) => {
                    self.discard_outputs(&outputs).await;
                    return Err(e);
                }
            }
        }

        let mut committed = false;
        let stored = outputs.clone();
        let result = self
            .mutate(job_id, |job, now| {
                if !owns(job, attempt) {
                    return Ok(false);
                }
                job.complete(stored, now)?;
                committed = true;
                Ok(true)
            })
            .await;

        match result {
            Ok(job) if committed => {
                self.schedule_cleanup(&job);
                info!(job_id = %job_id, outputs = job.output_refs.len(), attempt, "Job completed");
                Ok(())
            }
            Ok(_) => {
                debug!(job_id = %job_id, attempt, "Attempt lost the job before commit");
                self.discard_outputs(&outputs).await;
                Ok(())
            }
            Err(e) => {
                self.discard_outputs(&outputs).await;
                Err(e)
            }
        }
    }

    async fn discard_outputs(&self, outputs: &[ArtifactId]) {
        for id in outputs {
            if let Err(e) = self.inner.artifacts.delete(id).await {
                warn!(artifact_id = %id, error = %e, "Failed to discard output artifact");
            }
        }
    }

    /// Retry the job or fail it, depending on the error class and the
    /// attempts already made.
    async fn handle_failure(&self, job_id: JobId, attempt: u32, err: AppError) -> AppResult<()> {
        let inner = &self.inner;
        let class = err.class();
        let job_error = JobError::from(&err);
        let mut owned = false;

        let job = self
            .mutate(job_id, |job, now| {
                if !owns(job, attempt) {
                    return Ok(false);
                }
                owned = true;
                if inner.retry.should_retry(job.attempt_count, class) {
                    let delay = inner.retry.backoff(job.attempt_count);
                    let retry_at = after(now, delay);
                    inner.scheduler.schedule(job.id, TaskKind::Retry, retry_at);
                    job.schedule_retry(
                        job_error,
                        retry_at,
                        format!("retrying in {}ms", delay.as_millis()),
                        now,
                    )?;
                } else {
                    job.fail(job_error, now)?;
                }
                Ok(true)
            })
            .await?;

        if !owned {
            debug!(job_id = %job_id, attempt, error = %err, "Discarding failure of superseded attempt");
            return Ok(());
        }

        if job.status == JobStatus::Pending {
            warn!(
                job_id = %job_id,
                attempt = job.attempt_count,
                retry_at = ?job.retry_at,
                error = %err,
                "Attempt failed, retry scheduled"
            );
        } else {
            self.schedule_cleanup(&job);
            error!(
                job_id = %job_id,
                kind = %err.kind,
                class = ?class,
                attempts = job.attempt_count,
                error = %err,
                "Job failed"
            );
        }
        Ok(())
    }

    /// Queue the artifact cleanup of a terminal job at the end of its
    /// retention window.
    fn schedule_cleanup(&self, job: &Job) {
        let Some(window) = self.inner.retention.window(job.status) else {
            return;
        };
        let completed_at = job.completed_at.unwrap_or(job.updated_at);
        self.inner
            .scheduler
            .schedule(job.id, TaskKind::Cleanup, after(completed_at, window));
    }

    /// Put a job whose backoff has elapsed back into processing.
    async fn resume(&self, job_id: JobId) -> AppResult<bool> {
        let mut resumed = false;
        let job = self
            .mutate(job_id, |job, now| {
                if job.status != JobStatus::Pending || job.retry_at.is_none() {
                    return Ok(false);
                }
                job.transition_to(JobStatus::Processing, now)?;
                job.set_progress(0, "resuming", now);
                resumed = true;
                Ok(true)
            })
            .await?;

        if resumed {
            info!(job_id = %job_id, attempt = job.attempt_count, "Retrying job");
            self.spawn_attempt(job_id, job.attempt_count);
        }
        Ok(resumed)
    }

    /// Delete a terminal job's artifacts once. Returns how many existed.
    async fn cleanup(&self, job_id: JobId) -> AppResult<usize> {
        let _guard = self.lock_job(job_id).await;
        let Some(mut job) = self.inner.jobs.find(job_id).await? else {
            self.inner.scheduler.cancel_job(job_id);
            self.inner.locks.remove(&job_id);
            return Ok(0);
        };
        if !job.is_terminal() || job.artifacts_purged {
            return Ok(0);
        }

        let removed = delete_artifacts(self.inner.artifacts.as_ref(), &job).await?;
        job.mark_artifacts_purged(self.inner.clock.now());
        self.inner.jobs.upsert(&job).await?;
        self.inner.scheduler.cancel(job_id, TaskKind::Cleanup);
        self.inner.locks.remove(&job_id);

        info!(job_id = %job_id, removed, "Purged job artifacts");
        Ok(removed)
    }
}
