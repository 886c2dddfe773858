//! One-shot conversion command.

use std::path::PathBuf;

use bytes::Bytes;
use clap::Args;
use serde::Serialize;
use tokio::sync::watch;

use convhub_core::config::AppConfig;
use convhub_core::error::AppError;
use convhub_core::types::{ConversionOptions, Format, JobId};
use convhub_entity::{ConversionKind, CreateJob, Job, JobPriority, JobStatus};
use convhub_worker::{JobOrchestrator, TaskRunner};

use crate::output::{self, OutputFormat};
use crate::services::Services;

/// Arguments for the convert command
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// File to convert
    pub input: PathBuf,

    /// Target format
    #[arg(short, long)]
    pub to: String,

    /// Source format, defaults to the input file extension
    #[arg(long)]
    pub from: Option<String>,

    /// Conversion kind
    #[arg(short, long, default_value = "format-transcode")]
    pub kind: String,

    /// Job priority
    #[arg(short, long, default_value = "normal")]
    pub priority: String,

    /// Conversion option, repeatable
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Output file, defaults to the input path with the target extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ConvertReport<'a> {
    job: &'a Job,
    output: Option<PathBuf>,
}

/// Execute the convert command
pub async fn execute(
    args: &ConvertArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let kind: ConversionKind = args.kind.parse()?;
    let priority: JobPriority = args.priority.parse()?;
    let source = match &args.from {
        Some(from) => Format::parse(from)?,
        None => Format::from_path(&args.input).ok_or_else(|| {
            AppError::validation(format!(
                "Cannot tell the format of '{}', pass --from",
                args.input.display()
            ))
        })?,
    };
    let target = Format::parse(&args.to)?;

    let mut request = CreateJob::new(kind, source.as_str(), target.as_str()).with_priority(priority);
    for raw in &args.options {
        let (key, value) = ConversionOptions::parse_pair(raw)?;
        request = request.with_option(key, value);
    }

    let data = tokio::fs::read(&args.input).await.map_err(|e| {
        AppError::not_found(format!("Cannot read '{}': {}", args.input.display(), e))
    })?;

    let services = Services::build(config).await?;
    let orchestrator = services.orchestrator;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = TaskRunner::new(orchestrator.clone(), config.worker.tick_interval());
    let runner_handle = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    let result = run_job(&orchestrator, request, Bytes::from(data)).await;
    let _ = shutdown_tx.send(true);
    let _ = runner_handle.await;
    let job = result?;

    match job.status {
        JobStatus::Completed => {
            let output_path = args
                .output
                .clone()
                .unwrap_or_else(|| args.input.with_extension(target.as_str()));
            let artifact = job
                .output_refs
                .first()
                .ok_or_else(|| AppError::internal("Completed job has no output"))?;
            let payload = orchestrator.load_artifact(artifact).await?;
            tokio::fs::write(&output_path, &payload).await.map_err(|e| {
                AppError::storage(format!("Cannot write '{}': {}", output_path.display(), e))
            })?;

            match format {
                OutputFormat::Json => output::print_json(&ConvertReport {
                    job: &job,
                    output: Some(output_path),
                }),
                OutputFormat::Text => {
                    output::print_success(&format!(
                        "Converted {} -> {} ({} bytes)",
                        args.input.display(),
                        output_path.display(),
                        payload.len()
                    ));
                    output::print_kv("Job", &job.id.to_string());
                    output::print_kv("Retries", &job.attempt_count.to_string());
                }
            }
            Ok(())
        }
        JobStatus::Failed => {
            if format == OutputFormat::Json {
                output::print_json(&ConvertReport {
                    job: &job,
                    output: None,
                });
            }
            Err(match &job.last_error {
                Some(err) => AppError::new(err.kind, err.message.clone()),
                None => AppError::internal(format!("Job {} failed", job.id)),
            })
        }
        _ => Err(AppError::invalid_state(format!(
            "Job {} ended {}",
            job.id, job.status
        ))),
    }
}

/// Create, feed and start a job, following its progress until it is
/// terminal. Ctrl+C cancels it.
async fn run_job(
    orchestrator: &JobOrchestrator,
    request: CreateJob,
    data: Bytes,
) -> Result<Job, AppError> {
    let created = orchestrator.create(request).await?;
    let job_id: JobId = created.job_id;
    tracing::debug!(%job_id, eta = %created.estimated_completion, "Job created");

    orchestrator.upload_input(job_id, data).await?;
    let mut subscription = orchestrator.subscribe(job_id).await?;
    orchestrator.start(job_id).await?;

    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => {
                    output::print_progress(event.progress_percent, &event.current_stage);
                    if event.terminal {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                output::print_progress(0, "cancelling");
                orchestrator.cancel(job_id).await?;
                break;
            }
        }
    }

    orchestrator.unsubscribe(subscription.id());
    orchestrator.get_status(job_id).await
}
