//! Run orchestration: scan ingestion, hashing, grouping, verification,
//! consolidation.
//!
//! # Overview
//!
//! [`Engine::run`] drives the full pipeline over one scan:
//!
//! 1. **Ingest**: every scanner observation is upserted into the store;
//!    vanished paths under the scanned roots are pruned.
//! 2. **Hash**: stale records are hashed on a bounded worker pool and
//!    committed with an optimistic check (retried once if the file
//!    moved underneath the worker).
//! 3. **Index**: a store snapshot is grouped by content hash.
//! 4. **Verify + consolidate**: each multi-member group is byte-verified
//!    and linked, group by group, honoring the shutdown flag between
//!    groups.
//!
//! The engine returns a [`RunReport`]; it never prints or logs results.
//! Individual file failures become warnings in the report and the run
//! continues; only the metadata store failing outright aborts a run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;

use crate::consolidate::{consolidate_group, ConsolidateMode, GroupReport};
use crate::duplicates::verify::SkippedMember;
use crate::duplicates::{verify_group, HashIndex};
use crate::progress::ProgressCallback;
use crate::scanner::{Hasher, ScanError, ScannedFile};
use crate::store::{HashWrite, MetaStore, StaleState, StoreError};

/// Configuration for a consolidation run.
#[derive(Clone)]
pub struct EngineConfig {
    /// Number of I/O worker threads for hashing.
    /// Kept low by default to avoid thrashing spinning disks.
    pub io_threads: usize,
    /// Detect and verify but do not link.
    pub dry_run: bool,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("io_threads", &self.io_threads)
            .field("dry_run", &self.dry_run)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            dry_run: false,
            shutdown_flag: None,
            progress: None,
        }
    }
}

impl EngineConfig {
    /// Set the hashing worker count.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable or disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn mode(&self) -> ConsolidateMode {
        if self.dry_run {
            ConsolidateMode::DryRun
        } else {
            ConsolidateMode::Apply
        }
    }
}

/// Errors that abort a whole run.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The metadata store failed at a point where the run cannot
    /// meaningfully continue.
    #[error("metadata store failure: {0}")]
    Store(#[from] StoreError),
}

/// A non-fatal problem encountered during a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    /// Path the warning refers to, when there is one
    pub path: Option<PathBuf>,
    /// What happened
    pub message: String,
}

impl RunWarning {
    fn for_path(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self {
            path: Some(path.into()),
            message: message.to_string(),
        }
    }
}

/// Aggregate counters for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Files reported by the scanner
    pub files_scanned: usize,
    /// Store rows deleted because their path vanished
    pub records_pruned: usize,
    /// Digests computed this run (fresh records skip hashing)
    pub hashes_computed: usize,
    /// Records whose stored digest was still current
    pub hashes_reused: usize,
    /// Files that could not be hashed
    pub hash_failures: usize,
    /// Hash groups with two or more members
    pub groups_found: usize,
    /// Groups that split under byte verification
    pub groups_split: usize,
    /// Verified groups processed by the consolidator
    pub groups_consolidated: usize,
    /// Members newly linked
    pub members_linked: usize,
    /// Members that already shared the canonical storage
    pub members_already_linked: usize,
    /// Members that failed to link
    pub members_failed: usize,
    /// Bytes reclaimed by new links
    pub bytes_reclaimed: u64,
    /// Bytes a dry run identified as reclaimable
    pub bytes_reclaimable: u64,
    /// Whether the run stopped early on the shutdown flag
    pub interrupted: bool,
}

/// Everything a run produced. The reporting front-end renders this;
/// the engine itself never formats output.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Per-group outcomes, in hash order
    pub groups: Vec<GroupReport>,
    /// Members excluded during verification
    pub skipped: Vec<SkippedMember>,
    /// Non-fatal problems
    pub warnings: Vec<RunWarning>,
    /// Aggregate counters
    pub summary: RunSummary,
}

impl RunReport {
    /// Whether any duplicate groups were found at all.
    #[must_use]
    pub fn found_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Whether every attempted member succeeded.
    #[must_use]
    pub fn fully_succeeded(&self) -> bool {
        self.summary.members_failed == 0 && self.summary.hash_failures == 0
    }
}

/// The consolidation engine.
///
/// Owns the metadata store for the duration of a run; the filesystem
/// is only touched through the consolidator.
pub struct Engine {
    store: MetaStore,
    hasher: Hasher,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine over an open store.
    #[must_use]
    pub fn new(store: MetaStore, config: EngineConfig) -> Self {
        Self {
            store,
            hasher: Hasher::new(),
            config,
        }
    }

    /// Access the underlying store (for inspection after a run).
    #[must_use]
    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// Execute one full run over a scan stream.
    ///
    /// `roots` scope the pruning of vanished paths; `scan` supplies
    /// the observations, typically from [`crate::scanner::Walker`] but
    /// any source of the same tuples works.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`] when the store itself fails; all
    /// per-file problems are reported as warnings instead.
    pub fn run(
        &self,
        roots: &[PathBuf],
        scan: impl IntoIterator<Item = Result<ScannedFile, ScanError>>,
    ) -> Result<RunReport, EngineError> {
        let started_at = Utc::now();
        let mut warnings = Vec::new();
        let mut summary = RunSummary::default();

        // Stage 1: ingest observations
        let stale = self.ingest(scan, roots, &mut summary, &mut warnings)?;

        // Stage 2: hash stale records on the bounded pool
        self.hash_stale(stale, &mut summary, &mut warnings);

        // Stage 3: group a stable snapshot by content hash
        let index = HashIndex::build(self.store.snapshot()?);
        summary.groups_found = index.duplicate_group_count();

        // Stage 4: verify and consolidate, group by group
        let (groups, skipped) = self.process_groups(&index, &mut summary);

        summary.interrupted = self.config.is_shutdown_requested();
        if summary.interrupted {
            log::info!("Run interrupted; groups not yet started were left alone");
        }

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            groups,
            skipped,
            warnings,
            summary,
        })
    }

    fn ingest(
        &self,
        scan: impl IntoIterator<Item = Result<ScannedFile, ScanError>>,
        roots: &[PathBuf],
        summary: &mut RunSummary,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<Vec<ScannedFile>, EngineError> {
        if let Some(progress) = &self.config.progress {
            progress.on_phase_start("scan", 0);
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut stale = Vec::new();

        for item in scan {
            let file = match item {
                Ok(file) => file,
                Err(err) => {
                    log::warn!("Scan error: {err}");
                    warnings.push(RunWarning {
                        path: None,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            summary.files_scanned += 1;
            if let Some(progress) = &self.config.progress {
                progress.on_progress(summary.files_scanned, &file.path.to_string_lossy());
            }

            match self.store.upsert(&file.path, file.size, file.modified) {
                Ok(StaleState::NeedsHash) => {
                    seen.insert(file.path.clone());
                    stale.push(file);
                }
                Ok(StaleState::Fresh) => {
                    summary.hashes_reused += 1;
                    seen.insert(file.path.clone());
                }
                Err(err) => {
                    // One bad record must not sink the run
                    log::warn!("Store upsert failed for {}: {err}", file.path.display());
                    warnings.push(RunWarning::for_path(file.path, err));
                }
            }
        }

        summary.records_pruned = self.store.prune_missing(roots, &seen)?.len();

        if let Some(progress) = &self.config.progress {
            progress.on_phase_end("scan");
        }
        Ok(stale)
    }

    fn hash_stale(
        &self,
        stale: Vec<ScannedFile>,
        summary: &mut RunSummary,
        warnings: &mut Vec<RunWarning>,
    ) {
        if stale.is_empty() {
            log::debug!("No stale records to hash");
            return;
        }

        if let Some(progress) = &self.config.progress {
            progress.on_phase_start("hash", stale.len());
        }
        log::info!("Hashing {} file(s)", stale.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
            .unwrap_or_else(|_| {
                log::warn!(
                    "Failed to build bounded thread pool, falling back to {} threads",
                    rayon::current_num_threads()
                );
                rayon::ThreadPoolBuilder::new().build().unwrap()
            });

        let outcomes: Vec<HashOutcome> = pool.install(|| {
            stale
                .into_par_iter()
                .enumerate()
                .map(|(idx, file)| {
                    if self.config.is_shutdown_requested() {
                        return HashOutcome::Interrupted;
                    }
                    if let Some(progress) = &self.config.progress {
                        progress.on_progress(idx + 1, &file.path.to_string_lossy());
                    }
                    let outcome = self.hash_one(&file);
                    if let Some(progress) = &self.config.progress {
                        progress.on_item_completed(file.size);
                    }
                    outcome
                })
                .collect()
        });

        for outcome in outcomes {
            match outcome {
                HashOutcome::Committed => summary.hashes_computed += 1,
                HashOutcome::Failed(warning) => {
                    summary.hash_failures += 1;
                    warnings.push(warning);
                }
                HashOutcome::Interrupted => {}
            }
        }

        if let Some(progress) = &self.config.progress {
            progress.on_phase_end("hash");
        }
    }

    /// Hash one file and commit the digest, retrying once if the file
    /// changed underneath the worker.
    fn hash_one(&self, file: &ScannedFile) -> HashOutcome {
        let mut observed = file.clone();

        for attempt in 0..2 {
            let hash = match self.hasher.hash_file(&observed.path) {
                Ok(hash) => hash,
                Err(err) => {
                    log::warn!("Failed to hash {}: {err}", observed.path.display());
                    return HashOutcome::Failed(RunWarning::for_path(observed.path.clone(), err));
                }
            };

            match self
                .store
                .record_hash(&observed.path, observed.size, observed.modified, &hash)
            {
                Ok(HashWrite::Committed) => return HashOutcome::Committed,
                Ok(HashWrite::Superseded) if attempt == 0 => {
                    // The file moved between hash start and commit;
                    // re-observe and try once more
                    log::debug!(
                        "Hash superseded for {}, re-observing",
                        observed.path.display()
                    );
                    match std::fs::metadata(&observed.path)
                        .and_then(|m| m.modified().map(|t| (m.len(), t)))
                    {
                        Ok((size, modified)) => {
                            observed.size = size;
                            observed.modified = modified;
                            if let Err(err) =
                                self.store.upsert(&observed.path, size, modified)
                            {
                                return HashOutcome::Failed(RunWarning::for_path(
                                    observed.path.clone(),
                                    err,
                                ));
                            }
                        }
                        Err(err) => {
                            return HashOutcome::Failed(RunWarning::for_path(
                                observed.path.clone(),
                                err,
                            ))
                        }
                    }
                }
                Ok(HashWrite::Superseded) => {
                    return HashOutcome::Failed(RunWarning::for_path(
                        observed.path.clone(),
                        "file kept changing while being hashed",
                    ))
                }
                Err(err) => {
                    log::warn!(
                        "Failed to record hash for {}: {err}",
                        observed.path.display()
                    );
                    return HashOutcome::Failed(RunWarning::for_path(observed.path.clone(), err));
                }
            }
        }

        unreachable!("hash retry loop always returns")
    }

    fn process_groups(
        &self,
        index: &HashIndex,
        summary: &mut RunSummary,
    ) -> (Vec<GroupReport>, Vec<SkippedMember>) {
        let mode = self.config.mode();
        let mut reports = Vec::new();
        let mut skipped = Vec::new();

        if let Some(progress) = &self.config.progress {
            progress.on_phase_start("consolidate", summary.groups_found);
        }

        for (idx, (_, members)) in index.duplicate_groups().enumerate() {
            // Abortable between groups: finished groups stay
            // consolidated, unstarted groups are untouched
            if self.config.is_shutdown_requested() {
                break;
            }
            if let Some(progress) = &self.config.progress {
                progress.on_progress(idx + 1, &members[0].path.to_string_lossy());
            }

            let verification = verify_group(members);
            if verification.split {
                summary.groups_split += 1;
            }
            skipped.extend(verification.skipped);

            for group in verification.verified {
                let report = consolidate_group(&group, mode);
                summary.groups_consolidated += 1;
                summary.bytes_reclaimed += report.bytes_reclaimed();
                summary.bytes_reclaimable += report.bytes_reclaimable();
                for member in &report.members {
                    use crate::consolidate::LinkOutcome;
                    match member.outcome {
                        LinkOutcome::Linked { .. } => summary.members_linked += 1,
                        LinkOutcome::AlreadyLinked => summary.members_already_linked += 1,
                        LinkOutcome::WouldLink { .. } => summary.members_linked += 1,
                        LinkOutcome::Failed { .. } => summary.members_failed += 1,
                    }
                }
                reports.push(report);
            }
        }

        if let Some(progress) = &self.config.progress {
            progress.on_phase_end("consolidate");
        }

        (reports, skipped)
    }
}

enum HashOutcome {
    Committed,
    Failed(RunWarning),
    Interrupted,
}

/// Convenience: scan `roots` with the walker and run the engine over
/// the combined stream.
///
/// # Errors
///
/// Returns [`EngineError::Store`] when the store itself fails.
pub fn run_over_roots(
    engine: &Engine,
    roots: &[PathBuf],
    walker_config: &crate::scanner::WalkerConfig,
) -> Result<RunReport, EngineError> {
    let scan = roots.iter().flat_map(|root| {
        crate::scanner::Walker::new(root, walker_config.clone())
            .walk()
            .collect::<Vec<_>>()
    });
    engine.run(roots, scan)
}
