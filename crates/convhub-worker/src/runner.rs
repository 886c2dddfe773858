//! Task runner: the loop that fires due retries and cleanups.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::orchestrator::JobOrchestrator;

/// Drains the orchestrator's delayed task queue on a fixed tick.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    orchestrator: JobOrchestrator,
    tick_interval: Duration,
}

impl TaskRunner {
    /// Create a runner ticking every `tick_interval`.
    pub fn new(orchestrator: JobOrchestrator, tick_interval: Duration) -> Self {
        Self {
            orchestrator,
            tick_interval,
        }
    }

    /// Run until the cancel signal flips to `true` or its sender is dropped.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            "Task runner started"
        );

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Task runner received shutdown signal");
                        break;
                    }
                }
                _ = time::sleep(self.tick_interval) => {
                    let report = self.orchestrator.run_due_tasks().await;
                    if report.retries_resumed + report.cleanups_run > 0 {
                        tracing::debug!(
                            retries = report.retries_resumed,
                            cleanups = report.cleanups_run,
                            "Ran due tasks"
                        );
                    }
                }
            }
        }

        tracing::info!("Task runner shut down");
    }
}
