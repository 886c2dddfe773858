//! Artifact storage trait.

use async_trait::async_trait;
use bytes::Bytes;

use crate::result::AppResult;
use crate::types::ArtifactId;

/// Persistence for job input and output files.
///
/// Implementations live in `convhub-storage`.
#[async_trait]
pub trait ArtifactStore: Send + Sync + std::fmt::Debug + 'static {
    /// Return the provider type name (e.g. "memory", "local").
    fn provider_type(&self) -> &str;

    /// Store bytes and return a new reference to them.
    async fn save(&self, data: Bytes) -> AppResult<ArtifactId>;

    /// Load the bytes behind a reference. Unknown references are `NotFound`.
    async fn load(&self, id: &ArtifactId) -> AppResult<Bytes>;

    /// Delete an artifact. Returns whether anything was removed.
    async fn delete(&self, id: &ArtifactId) -> AppResult<bool>;

    /// Whether an artifact exists.
    async fn exists(&self, id: &ArtifactId) -> AppResult<bool>;
}
