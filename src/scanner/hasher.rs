//! Streaming BLAKE3 file hasher.
//!
//! # Overview
//!
//! Computes a 32-byte BLAKE3 digest of a file's content, reading in
//! bounded-size chunks so arbitrarily large files never need full
//! buffering. The digest is a fast equality pre-filter only; byte-level
//! verification remains the authoritative check before any two files are
//! consolidated.
//!
//! A file that shrinks or grows while being read yields
//! [`HashError::ChangedDuringRead`] instead of a digest of a partial
//! read.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::HashError;

/// A 32-byte BLAKE3 content digest.
pub type ContentHash = [u8; 32];

/// Read buffer size for streaming hashing and byte comparison.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Computes content digests for files.
///
/// Stateless; a single instance can be shared across worker threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct Hasher;

impl Hasher {
    /// Create a new hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Hash the full content of the file at `path`.
    ///
    /// The file's length is recorded when it is opened; if the number of
    /// bytes actually read differs (the file was truncated or extended
    /// mid-read), the digest is discarded and
    /// [`HashError::ChangedDuringRead`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::NotFound`] or [`HashError::PermissionDenied`]
    /// when the file cannot be opened, [`HashError::ChangedDuringRead`]
    /// on a concurrent modification, and [`HashError::Io`] for any other
    /// read failure.
    pub fn hash_file(&self, path: &Path) -> Result<ContentHash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let expected = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        let mut hasher = blake3::Hasher::new();
        let mut reader = file;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buf[..n]);
            total += n as u64;
        }

        if total != expected {
            return Err(HashError::ChangedDuringRead {
                path: path.to_path_buf(),
                expected,
                actual: total,
            });
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

/// Render a content hash as a lowercase hex string.
#[must_use]
pub fn hash_to_hex(hash: &ContentHash) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(64);
    for byte in hash {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse a 64-character hex string back into a content hash.
///
/// Returns `None` when the input is not exactly 64 hex digits.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<ContentHash> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut hash = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        hash[i] = ((hi << 4) | lo) as u8;
    }
    Some(hash)
}
