//! Report rendering for the CLI.
//!
//! The engine hands back a [`crate::engine::RunReport`]; these modules
//! turn it into something for a human ([`text`]) or a pipeline
//! ([`json`]). Rendering never re-inspects the filesystem.

pub mod json;
pub mod text;

use crate::cli::OutputFormat;
use crate::engine::RunReport;

/// Render a report in the requested format.
///
/// # Errors
///
/// Returns an error only if JSON serialization fails.
pub fn render(report: &RunReport, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(text::render(report)),
        OutputFormat::Json => json::render(report),
    }
}
