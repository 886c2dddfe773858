//! Job execution configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Job execution, retry and task-runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff unit in milliseconds; retry `n` waits `2^n` units.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Base duration used to estimate completion of transcode jobs.
    #[serde(default = "default_base_duration")]
    pub base_duration_seconds: u64,
    /// Interval at which the task runner checks for due retries and cleanups.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Timeout for a single external converter invocation.
    #[serde(default = "default_converter_timeout")]
    pub converter_timeout_seconds: u64,
}

impl WorkerConfig {
    /// Backoff unit as a [`Duration`].
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            base_duration_seconds: default_base_duration(),
            tick_interval_ms: default_tick_interval_ms(),
            converter_timeout_seconds: default_converter_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_base_duration() -> u64 {
    30
}

fn default_tick_interval_ms() -> u64 {
    250
}

fn default_converter_timeout() -> u64 {
    300
}
