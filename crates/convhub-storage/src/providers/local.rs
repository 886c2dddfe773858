//! Local filesystem artifact store.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use convhub_core::error::{AppError, ErrorKind};
use convhub_core::result::AppResult;
use convhub_core::traits::ArtifactStore;
use convhub_core::types::ArtifactId;

/// Artifacts stored as files under a root directory, fanned out by the
/// first two characters of the id.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    /// Root directory for all stored artifacts.
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Create a store rooted at the given path, creating it if needed.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    fn path_of(&self, id: &ArtifactId) -> PathBuf {
        let name = id.to_string();
        self.root.join(&name[..2]).join(format!("{name}.bin"))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    fn provider_type(&self) -> &str {
        "local"
    }

    async fn save(&self, data: Bytes) -> AppResult<ArtifactId> {
        let id = ArtifactId::new();
        let path = self.path_of(&id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        // Write to a sibling and rename so readers never see a partial file.
        let partial = path.with_extension("part");
        fs::write(&partial, &data).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to write artifact {id}"), e)
        })?;
        fs::rename(&partial, &path).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to commit artifact {id}"), e)
        })?;

        debug!(artifact = %id, bytes = data.len(), "Saved artifact");
        Ok(id)
    }

    async fn load(&self, id: &ArtifactId) -> AppResult<Bytes> {
        let data = fs::read(self.path_of(id)).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Artifact {id} not found"))
            } else {
                AppError::with_source(ErrorKind::Storage, format!("Failed to read artifact {id}"), e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, id: &ArtifactId) -> AppResult<bool> {
        match fs::remove_file(self.path_of(id)).await {
            Ok(()) => {
                debug!(artifact = %id, "Deleted artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete artifact {id}"),
                e,
            )),
        }
    }

    async fn exists(&self, id: &ArtifactId) -> AppResult<bool> {
        fs::try_exists(self.path_of(id)).await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, format!("Failed to stat artifact {id}"), e)
        })
    }
}
