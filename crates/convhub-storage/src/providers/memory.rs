//! In-memory artifact store.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use convhub_core::traits::ArtifactStore;
use convhub_core::types::ArtifactId;
use convhub_core::{AppError, AppResult};

/// Artifacts held in process memory. Used by tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: DashMap<ArtifactId, Bytes>,
}

impl MemoryArtifactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    fn provider_type(&self) -> &str {
        "memory"
    }

    async fn save(&self, data: Bytes) -> AppResult<ArtifactId> {
        let id = ArtifactId::new();
        self.artifacts.insert(id, data);
        Ok(id)
    }

    async fn load(&self, id: &ArtifactId) -> AppResult<Bytes> {
        self.artifacts
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::not_found(format!("Artifact {id} not found")))
    }

    async fn delete(&self, id: &ArtifactId) -> AppResult<bool> {
        Ok(self.artifacts.remove(id).is_some())
    }

    async fn exists(&self, id: &ArtifactId) -> AppResult<bool> {
        Ok(self.artifacts.contains_key(id))
    }
}
