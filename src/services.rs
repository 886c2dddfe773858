//! Service wiring shared by the commands.

use std::sync::Arc;
use std::time::Duration;

use convhub_cache::ConversionCache;
use convhub_converters::ConverterRegistry;
use convhub_core::config::AppConfig;
use convhub_core::result::AppResult;
use convhub_core::traits::{Clock, SystemClock};
use convhub_realtime::ProgressChannel;
use convhub_worker::{JobOrchestrator, OrchestratorDeps, RetentionSweeper};

/// Everything a command needs to run jobs.
#[derive(Debug, Clone)]
pub struct Services {
    /// Job orchestrator.
    pub orchestrator: JobOrchestrator,
    /// Retention sweeper over the same stores.
    pub sweeper: RetentionSweeper,
}

impl Services {
    /// Build the stores, converters and orchestrator selected by `config`.
    pub async fn build(config: &AppConfig) -> AppResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        tracing::info!("Initializing job store (provider: {})...", config.database.provider);
        let jobs = convhub_database::build_persistence(&config.database).await?;

        tracing::info!("Initializing artifact store (provider: {})...", config.storage.provider);
        let artifacts = convhub_storage::build_store(&config.storage).await?;

        let converter = ConverterRegistry::with_defaults(
            &config.converters,
            Duration::from_secs(config.worker.converter_timeout_seconds),
        );
        tracing::info!("Registered {} converters", converter.len());

        let deps = OrchestratorDeps {
            jobs: Arc::clone(&jobs),
            artifacts: Arc::clone(&artifacts),
            converter: Arc::new(converter),
            cache: ConversionCache::from_config(&config.cache, Arc::clone(&clock)),
            progress: ProgressChannel::from_config(&config.realtime),
            clock: Arc::clone(&clock),
        };
        let orchestrator = JobOrchestrator::from_config(deps, config);
        let sweeper = RetentionSweeper::from_config(jobs, artifacts, clock, &config.retention);

        Ok(Self {
            orchestrator,
            sweeper,
        })
    }
}
