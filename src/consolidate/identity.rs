//! Storage identity of a file: which underlying object a path names.
//!
//! Two paths with the same identity are hard links to the same data;
//! linking them again would be a no-op. On Unix the identity is the
//! (device, inode) pair from file metadata. On other platforms the
//! identity is unavailable and callers must treat every pair as
//! distinct (the consolidator then relies on content verification
//! alone and reports conservative outcomes).

use std::fs::Metadata;

/// Platform identity of an underlying storage object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    _unsupported: (),
}

impl FileIdentity {
    /// Extract the identity from metadata, if the platform supports it.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Whether two identities live on the same device (hard links can
    /// only exist within one filesystem).
    #[cfg(unix)]
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        self.dev == other.dev
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn same_device(&self, _other: &Self) -> bool {
        // Without device ids, let the link attempt report CrossesDevices
        true
    }

    /// Whether identity tracking works on this platform.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}
