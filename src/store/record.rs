//! Value types for store rows and write outcomes.

use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;

use crate::scanner::{hash_to_hex, ContentHash};

/// One entry of the metadata store, keyed by path.
///
/// Callers only ever hold immutable snapshots of rows; all mutation
/// goes through [`super::MetaStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path, the primary key.
    pub path: PathBuf,
    /// Size in bytes at last observation.
    pub size: u64,
    /// Modification time at last observation.
    pub modified: SystemTime,
    /// Content digest, `None` until computed. Never an empty value: a
    /// zero-length file gets the real digest of empty input.
    pub hash: Option<ContentHash>,
}

impl FileRecord {
    /// Create a record snapshot.
    #[must_use]
    pub fn new(
        path: PathBuf,
        size: u64,
        modified: SystemTime,
        hash: Option<ContentHash>,
    ) -> Self {
        Self {
            path,
            size,
            modified,
            hash,
        }
    }

    /// Whether a digest has been recorded for this row.
    #[must_use]
    pub fn is_hashed(&self) -> bool {
        self.hash.is_some()
    }

    /// The digest as lowercase hex, if present.
    #[must_use]
    pub fn hash_hex(&self) -> Option<String> {
        self.hash.as_ref().map(hash_to_hex)
    }

    /// Ordering key for canonical-member selection: earliest
    /// modification time first, ties broken by lexicographic path.
    #[must_use]
    pub fn canonical_key(&self) -> (SystemTime, &std::path::Path) {
        (self.modified, self.path.as_path())
    }
}

/// Result of an upsert: does the row need (re)hashing?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StaleState {
    /// The stored hash matches the observed size/mtime and can be used.
    Fresh,
    /// No trustworthy hash exists; the file must be hashed before it
    /// can participate in grouping.
    NeedsHash,
}

impl StaleState {
    /// Whether the record needs hashing.
    #[must_use]
    pub fn needs_hash(self) -> bool {
        matches!(self, Self::NeedsHash)
    }
}

/// Result of an optimistic hash commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashWrite {
    /// The digest was recorded against the expected size/mtime.
    Committed,
    /// The row changed (or disappeared) between hash start and commit;
    /// the digest was discarded and the caller must re-observe and
    /// retry.
    Superseded,
}
