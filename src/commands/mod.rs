//! CLI command definitions and dispatch.

pub mod convert;
pub mod formats;
pub mod serve;

use clap::{Parser, Subcommand};

use convhub_core::config::AppConfig;
use convhub_core::error::AppError;

use crate::output::OutputFormat;

/// ConvHub: file conversion jobs with result caching and live progress
#[derive(Debug, Parser)]
#[command(name = "convhub", version, about, long_about = None)]
pub struct Cli {
    /// Configuration environment, layered over config/default
    #[arg(short, long, default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the category and conversion targets of a format
    Formats(formats::FormatsArgs),
    /// Convert one file in-process
    Convert(convert::ConvertArgs),
    /// Run the orchestrator, task runner and retention sweep until stopped
    Serve(serve::ServeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Formats(args) => formats::execute(args, self.format),
            Commands::Convert(args) => convert::execute(args, &config, self.format).await,
            Commands::Serve(args) => serve::execute(args, &config).await,
        }
    }
}
