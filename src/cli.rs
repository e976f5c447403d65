//! Command-line interface definitions.
//!
//! All flags only shape an [`crate::engine::EngineConfig`] and the
//! report rendering; no detection or linking logic lives here.
//!
//! # Example
//!
//! ```bash
//! # See what would be consolidated, without touching anything
//! relinker --dry-run ~/backups
//!
//! # Consolidate two trees against one metadata database
//! relinker --db ~/.cache/relinker/media.db ~/photos ~/photos-backup
//!
//! # Machine-readable report
//! relinker --output json ~/backups > report.json
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// Consolidate byte-identical files into hard links.
///
/// relinker hashes file content (BLAKE3), verifies candidate groups
/// byte for byte, and atomically replaces redundant copies with hard
/// links to a single canonical file.
#[derive(Debug, Parser)]
#[command(name = "relinker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to scan for duplicates
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Metadata database location (defaults to the platform cache dir)
    #[arg(long, value_name = "FILE", env = "RELINKER_DB")]
    pub db: Option<PathBuf>,

    /// Detect and verify but do not create any links
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Output format for the run report
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Minimum file size to consider (e.g. 4KB, 1MiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g. 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Follow symbolic links during the scan
    ///
    /// Warning: may loop if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Number of I/O threads for hashing
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Emit errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors and the report
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Report rendering formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full report as JSON
    Json,
}

/// Parse a human-style size ("4KB", "1MiB", "200") into bytes.
fn parse_size(s: &str) -> Result<u64, String> {
    bytesize::ByteSize::from_str(s)
        .map(|b| b.as_u64())
        .map_err(|e| format!("invalid size '{s}': {e}"))
}
