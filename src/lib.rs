//! relinker - duplicate file consolidation via hard links
//!
//! Finds byte-identical files under a set of roots and atomically
//! replaces redundant copies with hard links to one canonical file.
//! Content hashes (BLAKE3) nominate candidate groups, full byte
//! comparison confirms them, and a persistent metadata store avoids
//! re-hashing unchanged files across runs.

pub mod cli;
pub mod config;
pub mod consolidate;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::engine::{run_over_roots, Engine, EngineConfig};
use crate::error::ExitCode;
use crate::progress::Progress;
use crate::scanner::WalkerConfig;
use crate::store::MetaStore;

/// Run the application with parsed CLI arguments.
///
/// Wires config, store, engine, and report rendering together and maps
/// the run outcome to an exit code. All detection and linking logic
/// lives in the library modules.
///
/// # Errors
///
/// Returns an error for unusable roots, an unopenable store, or a
/// store failure mid-run. Per-file problems do not error; they are
/// warnings inside the printed report.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let config = Config::load();

    let roots: Vec<PathBuf> = cli
        .paths
        .iter()
        .map(|p| {
            std::fs::canonicalize(p)
                .with_context(|| format!("cannot access scan root {}", p.display()))
        })
        .collect::<anyhow::Result<_>>()?;

    let db_path = match cli.db.clone().or_else(|| config.db_path.clone()) {
        Some(path) => path,
        None => config.resolve_db_path()?,
    };
    log::debug!("Using metadata store at {}", db_path.display());
    let store = MetaStore::open(&db_path)
        .with_context(|| format!("cannot open metadata store at {}", db_path.display()))?;

    let handler = signal::install_handler();

    let mut engine_config = EngineConfig::default()
        .with_io_threads(cli.io_threads.or(config.io_threads).unwrap_or(4))
        .with_dry_run(cli.dry_run)
        .with_shutdown_flag(handler.get_flag());

    let show_progress = !cli.no_progress && !cli.quiet && cli.output == OutputFormat::Text;
    if show_progress {
        engine_config = engine_config.with_progress(Arc::new(Progress::new(false)));
    }

    let walker_config = WalkerConfig::default()
        .with_follow_symlinks(cli.follow_symlinks || config.follow_symlinks)
        .with_skip_hidden(cli.skip_hidden || config.skip_hidden)
        .with_min_size(cli.min_size.or(config.min_size))
        .with_max_size(cli.max_size);

    let engine = Engine::new(store, engine_config);
    let report = run_over_roots(&engine, &roots, &walker_config)?;

    println!("{}", output::render(&report, cli.output)?);

    Ok(exit_code_for(&report))
}

fn exit_code_for(report: &engine::RunReport) -> ExitCode {
    if report.summary.interrupted {
        ExitCode::Interrupted
    } else if !report.fully_succeeded() {
        ExitCode::PartialSuccess
    } else if !report.found_duplicates() {
        ExitCode::NothingToDo
    } else {
        ExitCode::Success
    }
}
