//! The linking procedure and its per-member outcomes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::identity::FileIdentity;
use crate::duplicates::VerifiedGroup;
use crate::store::FileRecord;

/// Whether consolidation mutates the filesystem or only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidateMode {
    /// Replace redundant members with hard links.
    Apply,
    /// Report what would be linked; touch nothing.
    DryRun,
}

/// Why a member could not be linked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "path")]
pub enum LinkFailure {
    /// Member and canonical live on different filesystems.
    #[error("cross-device link not possible for {0}")]
    CrossDevice(PathBuf),

    /// The file changed on disk between verification and linking.
    #[error("file changed since verification: {0}")]
    Changed(PathBuf),

    /// Permission denied on the member or its directory.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The filesystem's maximum hard-link count was reached.
    #[error("hard link limit exceeded for {0}")]
    LinkLimitExceeded(PathBuf),

    /// Any other I/O failure.
    #[error("I/O error for {0}: {1}")]
    Io(PathBuf, String),
}

/// Outcome of processing one redundant member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// The member now hard-links to the canonical file.
    Linked {
        /// Bytes reclaimed by the replacement
        bytes: u64,
    },
    /// The member already shared the canonical file's storage.
    AlreadyLinked,
    /// Dry run: the member would have been linked.
    WouldLink {
        /// Bytes a real run would reclaim
        bytes: u64,
    },
    /// The member was left untouched.
    Failed {
        /// Why linking was refused or failed
        #[serde(flatten)]
        failure: LinkFailure,
    },
}

impl LinkOutcome {
    fn failed(failure: LinkFailure) -> Self {
        Self::Failed { failure }
    }

    /// Bytes actually reclaimed by this outcome.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        match self {
            Self::Linked { bytes } => *bytes,
            _ => 0,
        }
    }
}

/// One redundant member and what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct MemberReport {
    /// Path of the redundant member
    pub path: PathBuf,
    /// What the consolidator did
    #[serde(flatten)]
    pub outcome: LinkOutcome,
}

/// Consolidation result for one verified group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    /// The preserved canonical member
    pub canonical: PathBuf,
    /// Hex digest shared by the group
    pub hash: Option<String>,
    /// Per-member outcomes, in path order
    pub members: Vec<MemberReport>,
}

impl GroupReport {
    /// Bytes reclaimed across the group.
    #[must_use]
    pub fn bytes_reclaimed(&self) -> u64 {
        self.members
            .iter()
            .map(|m| m.outcome.bytes_reclaimed())
            .sum()
    }

    /// Bytes a dry run identified as reclaimable.
    #[must_use]
    pub fn bytes_reclaimable(&self) -> u64 {
        self.members
            .iter()
            .map(|m| match m.outcome {
                LinkOutcome::WouldLink { bytes } => bytes,
                _ => 0,
            })
            .sum()
    }

    /// Number of members that were linked (or would be).
    #[must_use]
    pub fn linked_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| {
                matches!(
                    m.outcome,
                    LinkOutcome::Linked { .. } | LinkOutcome::WouldLink { .. }
                )
            })
            .count()
    }

    /// Number of members that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| matches!(m.outcome, LinkOutcome::Failed { .. }))
            .count()
    }

    fn all_failed(group: &VerifiedGroup, failure: &LinkFailure) -> Self {
        Self {
            canonical: group.canonical.path.clone(),
            hash: group.canonical.hash_hex(),
            members: group
                .redundant
                .iter()
                .map(|member| MemberReport {
                    path: member.path.clone(),
                    outcome: LinkOutcome::failed(failure.clone()),
                })
                .collect(),
        }
    }
}

/// Consolidate one verified group.
///
/// The canonical file is re-statted first; if it no longer matches the
/// metadata it was verified under, the whole group fails with
/// [`LinkFailure::Changed`] (the verification no longer describes what
/// is on disk). Each redundant member then gets the same freshness
/// check before its own link. Failures are per member; one failing
/// member never aborts its siblings.
#[must_use]
pub fn consolidate_group(group: &VerifiedGroup, mode: ConsolidateMode) -> GroupReport {
    let canonical = &group.canonical;

    let canonical_meta = match fs::metadata(&canonical.path) {
        Ok(meta) => meta,
        Err(err) => {
            log::warn!(
                "Canonical {} unreadable at link time: {err}",
                canonical.path.display()
            );
            return GroupReport::all_failed(
                group,
                &LinkFailure::Changed(canonical.path.clone()),
            );
        }
    };
    if !metadata_matches(&canonical_meta, canonical) {
        log::warn!(
            "Canonical {} changed between verification and linking",
            canonical.path.display()
        );
        return GroupReport::all_failed(group, &LinkFailure::Changed(canonical.path.clone()));
    }
    let canonical_id = FileIdentity::from_metadata(&canonical_meta);

    let members = group
        .redundant
        .iter()
        .map(|member| MemberReport {
            path: member.path.clone(),
            outcome: link_member(canonical, canonical_id, member, mode),
        })
        .collect();

    GroupReport {
        canonical: canonical.path.clone(),
        hash: canonical.hash_hex(),
        members,
    }
}

fn link_member(
    canonical: &FileRecord,
    canonical_id: Option<FileIdentity>,
    member: &FileRecord,
    mode: ConsolidateMode,
) -> LinkOutcome {
    let member_meta = match fs::symlink_metadata(&member.path) {
        Ok(meta) => meta,
        Err(err) => return LinkOutcome::failed(classify_io(&member.path, &err)),
    };

    // A member that drifted since verification is no longer known to
    // be byte-identical; merging it would risk data loss
    if !metadata_matches(&member_meta, member) {
        return LinkOutcome::failed(LinkFailure::Changed(member.path.clone()));
    }

    if let (Some(canonical_id), Some(member_id)) =
        (canonical_id, FileIdentity::from_metadata(&member_meta))
    {
        if canonical_id == member_id {
            return LinkOutcome::AlreadyLinked;
        }
        if !canonical_id.same_device(&member_id) {
            return LinkOutcome::failed(LinkFailure::CrossDevice(member.path.clone()));
        }
    }

    if mode == ConsolidateMode::DryRun {
        return LinkOutcome::WouldLink { bytes: member.size };
    }

    match atomic_relink(&canonical.path, &member.path) {
        Ok(()) => {
            log::debug!(
                "Linked {} -> {}",
                member.path.display(),
                canonical.path.display()
            );
            LinkOutcome::Linked { bytes: member.size }
        }
        Err(failure) => LinkOutcome::failed(failure),
    }
}

/// Replace `target` with a hard link to `canonical`.
///
/// The link is created under a temporary name in the target's own
/// directory, then renamed over the target. Rename within one
/// directory is atomic, so the target path never stops existing; a
/// crash in between leaves the original target plus a stray temp link
/// that the next run removes.
fn atomic_relink(canonical: &Path, target: &Path) -> Result<(), LinkFailure> {
    let tmp = temp_link_path(target)?;

    // A leftover from a previously crashed run
    if tmp.exists() {
        let _ = fs::remove_file(&tmp);
    }

    fs::hard_link(canonical, &tmp).map_err(|err| classify_io(target, &err))?;

    if let Err(err) = fs::rename(&tmp, target) {
        let _ = fs::remove_file(&tmp);
        return Err(classify_io(target, &err));
    }

    Ok(())
}

fn temp_link_path(target: &Path) -> Result<PathBuf, LinkFailure> {
    let parent = target
        .parent()
        .ok_or_else(|| LinkFailure::Io(target.to_path_buf(), "no parent directory".into()))?;
    let name = target
        .file_name()
        .ok_or_else(|| LinkFailure::Io(target.to_path_buf(), "no file name".into()))?;

    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(format!(".{}.relink-tmp", std::process::id()));
    Ok(parent.join(tmp_name))
}

fn metadata_matches(meta: &fs::Metadata, record: &FileRecord) -> bool {
    if meta.len() != record.size {
        return false;
    }
    // Exact comparison is sound: the record's mtime is the
    // filesystem's own value, round-tripped losslessly by the store
    meta.modified().is_ok_and(|modified| modified == record.modified)
}

fn classify_io(path: &Path, err: &std::io::Error) -> LinkFailure {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::PermissionDenied => LinkFailure::PermissionDenied(path.to_path_buf()),
        ErrorKind::TooManyLinks => LinkFailure::LinkLimitExceeded(path.to_path_buf()),
        ErrorKind::CrossesDevices => LinkFailure::CrossDevice(path.to_path_buf()),
        ErrorKind::NotFound => LinkFailure::Changed(path.to_path_buf()),
        _ => LinkFailure::Io(path.to_path_buf(), err.to_string()),
    }
}
