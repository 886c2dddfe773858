//! Artifact and job retention configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retention windows for artifacts and job records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Seconds to keep artifacts of a completed job.
    #[serde(default = "default_completed")]
    pub completed_seconds: u64,
    /// Seconds to keep artifacts of a failed job.
    #[serde(default = "default_failed")]
    pub failed_seconds: u64,
    /// Cron expression (with seconds) for the retention sweeper.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
    /// Age after which terminal job records are removed by the sweeper.
    #[serde(default = "default_job_max_age")]
    pub job_max_age_seconds: u64,
}

impl RetentionConfig {
    /// Retention window after success.
    pub fn completed(&self) -> Duration {
        Duration::from_secs(self.completed_seconds)
    }

    /// Retention window after failure.
    pub fn failed(&self) -> Duration {
        Duration::from_secs(self.failed_seconds)
    }

    /// Maximum age of a terminal job record.
    pub fn job_max_age(&self) -> Duration {
        Duration::from_secs(self.job_max_age_seconds)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            completed_seconds: default_completed(),
            failed_seconds: default_failed(),
            sweep_cron: default_sweep_cron(),
            job_max_age_seconds: default_job_max_age(),
        }
    }
}

fn default_completed() -> u64 {
    2 * 60 * 60
}

fn default_failed() -> u64 {
    24 * 60 * 60
}

fn default_sweep_cron() -> String {
    "0 */10 * * * *".to_string()
}

fn default_job_max_age() -> u64 {
    24 * 60 * 60
}
