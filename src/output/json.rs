//! JSON report export.

use crate::engine::RunReport;

/// Serialize the full report as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render(report: &RunReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
