//! Conversion cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// In-memory conversion result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total payload size in megabytes before oldest-first eviction.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
    /// Time-to-live of a cached result in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl CacheConfig {
    /// Capacity in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_max_size_mb() -> u64 {
    1000
}

fn default_ttl() -> u64 {
    3600
}
