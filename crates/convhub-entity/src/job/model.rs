//! Job entity model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use convhub_core::types::{ArtifactId, ConversionOptions, Format, JobId};
use convhub_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::JobError;
use super::kind::ConversionKind;
use super::status::{JobPriority, JobStatus};

/// Metadata key linking a job to a batch.
pub const BATCH_ID_KEY: &str = "batch_id";

/// A conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// Requested operation.
    pub kind: ConversionKind,
    /// Job priority.
    pub priority: JobPriority,
    /// Current job status.
    pub status: JobStatus,
    /// Progress of the current attempt, 0..=100.
    pub progress_percent: u8,
    /// Label of the active processing step.
    pub current_stage: String,
    /// Input format.
    pub source_format: Format,
    /// Output format.
    pub target_format: Format,
    /// Client-supplied conversion options.
    pub options: ConversionOptions,
    /// Input artifacts owned by this job.
    pub input_refs: Vec<ArtifactId>,
    /// Output artifacts owned by this job, one per input.
    pub output_refs: Vec<ArtifactId>,
    /// Number of retries scheduled so far.
    pub attempt_count: u32,
    /// Most recent error.
    pub last_error: Option<JobError>,
    /// Free-form metadata (batch linkage, diagnostics).
    pub metadata: BTreeMap<String, String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job first started processing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job first entered a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Advertised completion estimate.
    pub estimated_completion: DateTime<Utc>,
    /// When the next retry is due, while waiting for one.
    pub retry_at: Option<DateTime<Utc>>,
    /// Whether the job's artifacts have been deleted.
    pub artifacts_purged: bool,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a new pending job from a validated request.
    pub fn new(
        request: &CreateJob,
        now: DateTime<Utc>,
        estimated_completion: DateTime<Utc>,
    ) -> AppResult<Self> {
        let (source_format, target_format) = request.formats()?;
        Ok(Self {
            id: JobId::new(),
            kind: request.kind,
            priority: request.priority,
            status: JobStatus::Pending,
            progress_percent: 0,
            current_stage: "queued".to_string(),
            source_format,
            target_format,
            options: request.options.clone().into_iter().collect(),
            input_refs: Vec::new(),
            output_refs: Vec::new(),
            attempt_count: 0,
            last_error: None,
            metadata: request.metadata.clone(),
            created_at: now,
            started_at: None,
            completed_at: None,
            estimated_completion,
            retry_at: None,
            artifacts_purged: false,
            updated_at: now,
        })
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Batch this job belongs to, if any.
    pub fn batch_id(&self) -> Option<&str> {
        self.metadata.get(BATCH_ID_KEY).map(String::as_str)
    }

    /// Options handed to the converter and the cache fingerprint: the
    /// client options plus the operation name.
    pub fn effective_options(&self) -> ConversionOptions {
        self.options
            .clone()
            .with(convhub_core::types::options::OPERATION_KEY, self.kind.as_str())
    }

    /// Move to `next`, enforcing the state machine.
    ///
    /// Entering `Processing` records `started_at` the first time; entering a
    /// terminal state records `completed_at` the first time.
    pub fn transition_to(&mut self, next: JobStatus, now: DateTime<Utc>) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::invalid_state(format!(
                "Job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        if next == JobStatus::Processing {
            self.started_at.get_or_insert(now);
            self.retry_at = None;
        }
        if next.is_terminal() {
            self.completed_at.get_or_insert(now);
            self.retry_at = None;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Record progress. The percentage never decreases within an attempt.
    pub fn set_progress(&mut self, percent: u8, stage: impl Into<String>, now: DateTime<Utc>) {
        if self.is_terminal() {
            return;
        }
        self.progress_percent = self.progress_percent.max(percent.min(100));
        self.current_stage = stage.into();
        self.updated_at = now;
    }

    /// Mark the job completed with its outputs.
    pub fn complete(&mut self, outputs: Vec<ArtifactId>, now: DateTime<Utc>) -> AppResult<()> {
        self.transition_to(JobStatus::Completed, now)?;
        self.output_refs = outputs;
        self.progress_percent = 100;
        self.current_stage = "completed".to_string();
        Ok(())
    }

    /// Mark the job failed.
    pub fn fail(&mut self, error: JobError, now: DateTime<Utc>) -> AppResult<()> {
        self.transition_to(JobStatus::Failed, now)?;
        self.current_stage = "failed".to_string();
        self.last_error = Some(error);
        Ok(())
    }

    /// Put a processing job back to pending for another attempt.
    pub fn schedule_retry(
        &mut self,
        error: JobError,
        retry_at: DateTime<Utc>,
        stage: impl Into<String>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.transition_to(JobStatus::Pending, now)?;
        self.attempt_count += 1;
        self.progress_percent = 0;
        self.current_stage = stage.into();
        self.last_error = Some(error);
        self.retry_at = Some(retry_at);
        Ok(())
    }

    /// Cancel the job. Returns `false` when it was already cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> AppResult<bool> {
        if self.status == JobStatus::Cancelled {
            return Ok(false);
        }
        self.transition_to(JobStatus::Cancelled, now)?;
        self.current_stage = "cancelled".to_string();
        Ok(true)
    }

    /// Cleanup bookkeeping, the only mutation allowed after a terminal state.
    pub fn mark_artifacts_purged(&mut self, now: DateTime<Utc>) {
        self.artifacts_purged = true;
        self.updated_at = now;
    }

    /// All artifacts owned by the job.
    pub fn artifact_refs(&self) -> impl Iterator<Item = &ArtifactId> {
        self.input_refs.iter().chain(self.output_refs.iter())
    }
}

/// Data required to create a new job.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJob {
    /// Requested operation.
    pub kind: ConversionKind,
    /// Priority.
    #[serde(default)]
    pub priority: JobPriority,
    /// Input format name.
    #[validate(length(min = 1, max = 16))]
    pub source_format: String,
    /// Output format name.
    #[validate(length(min = 1, max = 16))]
    pub target_format: String,
    /// Conversion options.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CreateJob {
    /// A request with default priority and no options.
    pub fn new(
        kind: ConversionKind,
        source_format: impl Into<String>,
        target_format: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            priority: JobPriority::default(),
            source_format: source_format.into(),
            target_format: target_format.into(),
            options: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add an option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Link the job to a batch.
    pub fn in_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.metadata.insert(BATCH_ID_KEY.to_string(), batch_id.into());
        self
    }

    /// Parse both format names.
    pub fn formats(&self) -> AppResult<(Format, Format)> {
        Ok((
            Format::parse(&self.source_format)?,
            Format::parse(&self.target_format)?,
        ))
    }
}
