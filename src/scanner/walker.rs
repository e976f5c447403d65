//! Directory traversal producing scan observations.
//!
//! Wraps `walkdir` and applies the [`WalkerConfig`] filters. Only
//! regular files are reported; directories, sockets, and (by default)
//! symlinks are skipped. Unreadable entries become [`ScanError`]s in the
//! stream so the caller can log and continue rather than abort the walk.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{ScanError, ScannedFile, WalkerConfig};

/// Recursive directory walker.
pub struct Walker {
    root: PathBuf,
    config: WalkerConfig,
}

impl Walker {
    /// Create a walker rooted at `root`.
    #[must_use]
    pub fn new(root: &Path, config: WalkerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// Walk the tree, yielding one item per regular file.
    ///
    /// Filter rules from the config are applied here so the engine only
    /// ever sees candidate files.
    pub fn walk(&self) -> impl Iterator<Item = Result<ScannedFile, ScanError>> + '_ {
        let skip_hidden = self.config.skip_hidden;
        let root = self.root.clone();

        WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .into_iter()
            .filter_entry(move |entry| {
                // Never filter the root itself, even if it is "hidden"
                if entry.path() == root {
                    return true;
                }
                !(skip_hidden && is_hidden(entry.file_name()))
            })
            .filter_map(move |entry| self.convert(entry))
    }

    fn convert(
        &self,
        entry: Result<walkdir::DirEntry, walkdir::Error>,
    ) -> Option<Result<ScannedFile, ScanError>> {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => return Some(Err(convert_error(err))),
        };

        if !entry.file_type().is_file() {
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                return Some(Err(ScanError::Io {
                    path: entry.path().to_path_buf(),
                    source: err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("metadata unavailable")),
                }))
            }
        };

        let size = metadata.len();
        if self.config.min_size.is_some_and(|min| size < min) {
            log::trace!("Skipping {} (below min size)", entry.path().display());
            return None;
        }
        if self.config.max_size.is_some_and(|max| size > max) {
            log::trace!("Skipping {} (above max size)", entry.path().display());
            return None;
        }

        let modified = match metadata.modified() {
            Ok(time) => time,
            Err(err) => {
                return Some(Err(ScanError::Io {
                    path: entry.path().to_path_buf(),
                    source: err,
                }))
            }
        };

        Some(Ok(ScannedFile::new(
            entry.path().to_path_buf(),
            size,
            modified,
        )))
    }
}

/// Hidden means a leading dot in the file name, Unix convention.
fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn convert_error(err: walkdir::Error) -> ScanError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    match err.io_error().map(std::io::Error::kind) {
        Some(std::io::ErrorKind::PermissionDenied) => ScanError::PermissionDenied(path),
        Some(std::io::ErrorKind::NotFound) => ScanError::NotFound(path),
        _ => ScanError::Io {
            path,
            source: err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk error")),
        },
    }
}
