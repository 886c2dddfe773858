//! # convhub-storage
//!
//! [`ArtifactStore`](convhub_core::traits::ArtifactStore) implementations
//! for job input and output files.

pub mod providers;

use std::sync::Arc;

use convhub_core::config::StorageConfig;
use convhub_core::traits::ArtifactStore;
use convhub_core::{AppError, AppResult};

pub use providers::local::LocalArtifactStore;
pub use providers::memory::MemoryArtifactStore;

/// Build the artifact store selected by configuration.
pub async fn build_store(config: &StorageConfig) -> AppResult<Arc<dyn ArtifactStore>> {
    match config.provider.as_str() {
        "memory" => Ok(Arc::new(MemoryArtifactStore::new())),
        "local" => Ok(Arc::new(LocalArtifactStore::new(&config.root).await?)),
        other => Err(AppError::configuration(format!(
            "Unknown storage provider '{other}'"
        ))),
    }
}
