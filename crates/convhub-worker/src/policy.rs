//! Retry, retention and estimate policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use convhub_core::ErrorClass;
use convhub_core::config::{RetentionConfig, WorkerConfig};
use convhub_entity::{ConversionKind, JobPriority, JobStatus};

/// Exponential backoff retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Backoff unit.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Build from configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
        }
    }

    /// Whether a failure of `class` after `attempt_count` retries gets another go.
    pub fn should_retry(&self, attempt_count: u32, class: ErrorClass) -> bool {
        class == ErrorClass::Transient && attempt_count < self.max_retries
    }

    /// Delay before the retry following `attempt_count` retries: `2^attempt_count` units.
    pub fn backoff(&self, attempt_count: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_count).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

/// How long a job's artifacts outlive its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Window after success.
    pub completed: Duration,
    /// Window after failure.
    pub failed: Duration,
}

impl RetentionPolicy {
    /// Build from configuration.
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            completed: config.completed(),
            failed: config.failed(),
        }
    }

    /// Retention window for a terminal status. Cancelled jobs are cleaned
    /// up immediately.
    pub fn window(&self, status: JobStatus) -> Option<Duration> {
        match status {
            JobStatus::Completed => Some(self.completed),
            JobStatus::Failed => Some(self.failed),
            JobStatus::Cancelled => Some(Duration::ZERO),
            JobStatus::Pending | JobStatus::Processing => None,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&RetentionConfig::default())
    }
}

/// Completion estimates advertised at job creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtaEstimator {
    /// Base duration of a plain transcode.
    pub transcode: Duration,
}

impl EtaEstimator {
    /// Build from configuration.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            transcode: Duration::from_secs(config.base_duration_seconds),
        }
    }

    /// Typical duration of one job of `kind` at normal priority.
    pub fn base_duration(&self, kind: ConversionKind) -> Duration {
        match kind {
            ConversionKind::ImageResize => Duration::from_secs(10),
            ConversionKind::FormatTranscode => self.transcode,
            ConversionKind::AudioExtract => Duration::from_secs(60),
            ConversionKind::DocumentRender => Duration::from_secs(45),
        }
    }

    /// Estimated completion time for a job created at `now`.
    pub fn estimate(
        &self,
        kind: ConversionKind,
        priority: JobPriority,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let secs = self.base_duration(kind).as_secs_f64() * priority.eta_multiplier();
        let millis = (secs * 1000.0).round() as i64;
        now + chrono::Duration::milliseconds(millis)
    }
}

impl Default for EtaEstimator {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}
