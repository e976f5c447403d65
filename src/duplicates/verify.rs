//! Byte-level verification of hash-collision groups.
//!
//! # Overview
//!
//! Hash equality nominates a group; byte equality decides it. Each
//! candidate group is partitioned into equality classes by full
//! byte-for-byte comparison, so even an engineered hash collision can
//! never merge two files with different content. Members that cannot be
//! read any more (removed or locked mid-run) are excluded with a
//! warning instead of failing the whole group.
//!
//! The canonical member of each verified class is chosen
//! deterministically: earliest recorded modification time, ties broken
//! by lexicographically smallest path. Re-runs therefore make the same
//! linking decisions.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::scanner::{HashError, CHUNK_SIZE};
use crate::store::FileRecord;

/// A group of byte-identical files ready for consolidation.
#[derive(Debug, Clone)]
pub struct VerifiedGroup {
    /// The member kept as-is; all others are relinked to it.
    pub canonical: FileRecord,
    /// Members to be replaced by hard links to the canonical file.
    pub redundant: Vec<FileRecord>,
}

impl VerifiedGroup {
    /// Build a group from byte-identical members, selecting the
    /// canonical member. Returns `None` for fewer than two members.
    #[must_use]
    pub fn from_members(mut members: Vec<FileRecord>) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }

        let canonical_at = members
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.canonical_key().cmp(&b.canonical_key()))
            .map(|(i, _)| i)?;
        let canonical = members.swap_remove(canonical_at);
        members.sort_by(|a, b| a.path.cmp(&b.path));

        Some(Self {
            canonical,
            redundant: members,
        })
    }

    /// Total bytes that linking the redundant members would reclaim.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.redundant.iter().map(|r| r.size).sum()
    }

    /// Members including the canonical one.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.redundant.len() + 1
    }
}

/// A member dropped from verification because it could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedMember {
    /// Path of the dropped member
    pub path: PathBuf,
    /// Why it was dropped
    pub reason: String,
}

/// Outcome of verifying one hash-collision group.
#[derive(Debug, Default)]
pub struct GroupVerification {
    /// Byte-identical classes with two or more members.
    pub verified: Vec<VerifiedGroup>,
    /// Members left alone after a split produced a class of one.
    pub singletons: Vec<FileRecord>,
    /// Members excluded because they could not be read.
    pub skipped: Vec<SkippedMember>,
    /// Whether the group held members with differing content despite
    /// equal hashes.
    pub split: bool,
}

/// Partition `members` into byte-identical classes.
///
/// Every member is compared against one representative per existing
/// class; the comparison short-circuits on the first differing byte. A
/// member whose reads fail is recorded in `skipped`; a representative
/// whose reads fail invalidates further matching against its class but
/// keeps the members already confirmed equal to each other.
#[must_use]
pub fn verify_group(members: &[FileRecord]) -> GroupVerification {
    struct EqClass {
        rep: FileRecord,
        members: Vec<FileRecord>,
        readable: bool,
    }

    let mut classes: Vec<EqClass> = Vec::new();
    let mut result = GroupVerification::default();

    'members: for member in members {
        for class in &mut classes {
            if !class.readable {
                continue;
            }
            match files_equal(&class.rep.path, &member.path) {
                Ok(true) => {
                    class.members.push(member.clone());
                    continue 'members;
                }
                Ok(false) => {}
                Err(err) if err.path() == member.path => {
                    log::warn!(
                        "Excluding {} from verification: {err}",
                        member.path.display()
                    );
                    result.skipped.push(SkippedMember {
                        path: member.path.clone(),
                        reason: err.to_string(),
                    });
                    continue 'members;
                }
                Err(err) => {
                    // The representative itself became unreadable;
                    // its confirmed members stay, new matching stops
                    log::warn!(
                        "Reference {} became unreadable during verification: {err}",
                        class.rep.path.display()
                    );
                    class.readable = false;
                }
            }
        }

        classes.push(EqClass {
            rep: member.clone(),
            members: vec![member.clone()],
            readable: true,
        });
    }

    result.split = classes.len() > 1;
    if result.split {
        log::info!(
            "Hash group split into {} byte-distinct class(es)",
            classes.len()
        );
    }

    for class in classes {
        match VerifiedGroup::from_members(class.members) {
            Some(group) => result.verified.push(group),
            None => result
                .singletons
                .push(class.rep),
        }
    }

    result
}

/// Compare two files byte for byte, short-circuiting on the first
/// mismatch. Differing lengths are a mismatch without reading content.
///
/// # Errors
///
/// Returns [`HashError`] naming the path whose open or read failed.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool, HashError> {
    let mut file_a = File::open(a).map_err(|e| HashError::from_io(a, e))?;
    let mut file_b = File::open(b).map_err(|e| HashError::from_io(b, e))?;

    let len_a = file_a.metadata().map_err(|e| HashError::from_io(a, e))?.len();
    let len_b = file_b.metadata().map_err(|e| HashError::from_io(b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut buf_a = vec![0u8; CHUNK_SIZE];
    let mut buf_b = vec![0u8; CHUNK_SIZE];

    loop {
        let n_a = read_full(&mut file_a, &mut buf_a, a)?;
        let n_b = read_full(&mut file_b, &mut buf_b, b)?;

        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a < CHUNK_SIZE {
            // Both hit EOF on the same chunk with equal content
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows, tolerating short reads.
fn read_full(reader: &mut impl Read, buf: &mut [u8], path: &Path) -> Result<usize, HashError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HashError::from_io(path, e)),
        }
    }
    Ok(filled)
}
