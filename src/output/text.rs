//! Human-readable report rendering.

use std::fmt::Write;

use bytesize::ByteSize;
use yansi::Paint;

use crate::consolidate::{LinkOutcome, MemberReport};
use crate::engine::RunReport;

/// Render the report as a colored terminal summary.
#[must_use]
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    for group in &report.groups {
        let _ = writeln!(out, "{} {}", "keep".green().bold(), group.canonical.display());
        for member in &group.members {
            let _ = writeln!(out, "  {}", member_line(member));
        }
    }

    if !report.skipped.is_empty() {
        let _ = writeln!(out);
        for skipped in &report.skipped {
            let _ = writeln!(
                out,
                "{} {}: {}",
                "skipped".yellow(),
                skipped.path.display(),
                skipped.reason
            );
        }
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!("{} warning(s), rerun with -v for details", report.warnings.len()).yellow()
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Scanned {} file(s), computed {} hash(es), {} duplicate group(s)",
        summary.files_scanned, summary.hashes_computed, summary.groups_found
    );
    if summary.groups_split > 0 {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "{} group(s) split by byte verification (hash collision caught)",
                summary.groups_split
            )
            .yellow()
        );
    }

    let linked = format!(
        "{} member(s) linked, {} already linked, {} failed",
        summary.members_linked, summary.members_already_linked, summary.members_failed
    );
    let _ = writeln!(out, "{linked}");

    if summary.bytes_reclaimable > 0 {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "Would reclaim {} (dry run)",
                ByteSize::b(summary.bytes_reclaimable)
            )
            .cyan()
            .bold()
        );
    } else {
        let _ = writeln!(
            out,
            "{}",
            format!("Reclaimed {}", ByteSize::b(summary.bytes_reclaimed))
                .green()
                .bold()
        );
    }

    if summary.interrupted {
        let _ = writeln!(out, "{}", "Run was interrupted before completion".red());
    }

    out
}

fn member_line(member: &MemberReport) -> String {
    let path = member.path.display();
    match &member.outcome {
        LinkOutcome::Linked { bytes } => format!(
            "{} {path} ({})",
            "linked".green(),
            ByteSize::b(*bytes)
        ),
        LinkOutcome::WouldLink { bytes } => format!(
            "{} {path} ({})",
            "would link".cyan(),
            ByteSize::b(*bytes)
        ),
        LinkOutcome::AlreadyLinked => format!("{} {path}", "already linked".dim()),
        LinkOutcome::Failed { failure } => format!("{} {path}: {failure}", "failed".red()),
    }
}
