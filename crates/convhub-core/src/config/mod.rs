//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a serde default, so an empty
//! configuration is a valid one.

pub mod cache;
pub mod converters;
pub mod database;
pub mod logging;
pub mod realtime;
pub mod retention;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::cache::CacheConfig;
pub use self::converters::ConvertersConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::RealtimeConfig;
pub use self::retention::RetentionConfig;
pub use self::storage::StorageConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Conversion result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Job execution and retry settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Artifact and job retention settings.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Artifact storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Job persistence settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Progress channel settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// External converter tool settings.
    #[serde(default)]
    pub converters: ConvertersConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `CONVHUB__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CONVHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        app.validate()?;
        Ok(app)
    }

    /// Reject values that would make the services misbehave.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.cache.max_size_mb == 0 {
            return Err(AppError::configuration("cache.max_size_mb must be > 0"));
        }
        if self.cache.ttl_seconds == 0 {
            return Err(AppError::configuration("cache.ttl_seconds must be > 0"));
        }
        if self.worker.tick_interval_ms == 0 {
            return Err(AppError::configuration("worker.tick_interval_ms must be > 0"));
        }
        match self.storage.provider.as_str() {
            "memory" | "local" => {}
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown storage provider '{other}'"
                )));
            }
        }
        match self.database.provider.as_str() {
            "memory" | "postgres" => {}
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown database provider '{other}'"
                )));
            }
        }
        Ok(())
    }
}
