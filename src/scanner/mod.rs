//! Scanner module: file discovery and content hashing.
//!
//! This module is the engine's supplier, not part of the engine itself.
//! The walker discovers files and reports `(path, size, modified)`
//! tuples; the engine does not care how discovery happens and accepts
//! the same tuples from any other source (watch events, a saved
//! listing).
//!
//! # Architecture
//!
//! - [`walker`]: recursive directory traversal and filtering
//! - [`hasher`]: streaming BLAKE3 content hashing

pub mod hasher;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

pub use hasher::{hash_to_hex, hex_to_hash, ContentHash, Hasher, CHUNK_SIZE};
pub use walker::Walker;

/// A file observation produced by the scanner.
///
/// One tuple per discovered regular file; this is the only thing the
/// engine ever learns from the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes at observation time
    pub size: u64,
    /// Last modification time at observation time
    pub modified: SystemTime,
}

impl ScannedFile {
    /// Create a new scanned-file observation.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: may loop on symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include, in bytes.
    pub min_size: Option<u64>,

    /// Maximum file size to include, in bytes.
    pub max_size: Option<u64>,
}

impl WalkerConfig {
    /// Follow symbolic links during traversal.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Skip hidden files and directories.
    #[must_use]
    pub fn with_skip_hidden(mut self, skip: bool) -> Self {
        self.skip_hidden = skip;
        self
    }

    /// Only include files of at least `size` bytes.
    #[must_use]
    pub fn with_min_size(mut self, size: Option<u64>) -> Self {
        self.min_size = size;
        self
    }

    /// Only include files of at most `size` bytes.
    #[must_use]
    pub fn with_max_size(mut self, size: Option<u64>) -> Self {
        self.max_size = size;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified root was not found.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// The specified root is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while walking.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while reading file content for hashing or
/// byte comparison.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file was not found (removed mid-run).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file's length changed while it was being read.
    #[error("file changed during read: {path} (expected {expected} bytes, read {actual})")]
    ChangedDuringRead {
        /// Path that changed under the reader
        path: PathBuf,
        /// Length observed when the file was opened
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify a raw I/O error for `path`.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::ChangedDuringRead { path, .. } | Self::Io { path, .. } => path,
        }
    }
}
