//! Long-running service command.

use std::time::Duration;

use clap::Args;
use tokio::sync::watch;

use convhub_core::config::AppConfig;
use convhub_core::error::AppError;
use convhub_worker::{CronScheduler, TaskRunner};

use crate::services::Services;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Do not schedule the periodic retention sweep
    #[arg(long)]
    pub no_sweep: bool,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, config: &AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting ConvHub v{}", env!("CARGO_PKG_VERSION"));

    let services = Services::build(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runner = TaskRunner::new(services.orchestrator.clone(), config.worker.tick_interval());
    let runner_handle = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    let mut cron = if args.no_sweep {
        tracing::info!("Retention sweep disabled");
        None
    } else {
        let cron = CronScheduler::new().await?;
        cron.register_retention_sweep(services.sweeper.clone(), &config.retention.sweep_cron)
            .await?;
        cron.start().await?;
        Some(cron)
    };

    tracing::info!("ConvHub running, press Ctrl+C to stop");
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    let _ = shutdown_tx.send(true);
    if let Some(cron) = cron.as_mut() {
        cron.shutdown().await?;
    }
    let _ = tokio::time::timeout(Duration::from_secs(30), runner_handle).await;
    services.orchestrator.shutdown();

    tracing::info!("ConvHub shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
