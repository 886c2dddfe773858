//! Format lookup command.

use std::path::Path;

use clap::Args;
use serde::Serialize;

use convhub_core::error::AppError;
use convhub_core::types::Format;
use convhub_formats::{Category, ConversionRouter};

use crate::output::{self, OutputFormat};

/// Arguments for the formats command
#[derive(Debug, Args)]
pub struct FormatsArgs {
    /// Format name or file name, e.g. `png` or `report.docx`
    pub source: String,
}

#[derive(Debug, Serialize)]
struct FormatsReport {
    source: Format,
    category: Category,
    targets: Vec<Format>,
}

/// Execute the formats command
pub fn execute(args: &FormatsArgs, format: OutputFormat) -> Result<(), AppError> {
    let source = Format::parse(&args.source)
        .ok()
        .or_else(|| Format::from_path(Path::new(&args.source)))
        .ok_or_else(|| AppError::validation(format!("Not a format name: '{}'", args.source)))?;

    let router = ConversionRouter::new();
    let category = router.category_of(&source).ok_or_else(|| {
        AppError::unsupported_conversion(format!("Unknown format '{}'", source))
    })?;
    let report = FormatsReport {
        targets: router.supported_targets(&source).into_iter().collect(),
        source,
        category,
    };

    match format {
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Text => {
            output::print_kv("Format", report.source.as_str());
            output::print_kv("Category", report.category.as_str());
            let targets: Vec<&str> = report.targets.iter().map(Format::as_str).collect();
            output::print_kv("Targets", &targets.join(", "));
        }
    }
    Ok(())
}
