//! Artifact storage configuration.

use serde::{Deserialize, Serialize};

/// Artifact storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Provider type: `"memory"` or `"local"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Root directory for the local provider.
    #[serde(default = "default_root")]
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root: default_root(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_root() -> String {
    "./data/artifacts".to_string()
}
