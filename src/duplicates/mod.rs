//! Duplicate detection: hash grouping and byte-level verification.
//!
//! # Overview
//!
//! Detection runs in two stages over an immutable store snapshot:
//!
//! 1. [`index`]: group records by content hash. Hash equality is a
//!    pre-filter, cheap and parallel.
//! 2. [`verify`]: confirm byte equality within each candidate group.
//!    This is the authoritative check; a genuine hash collision splits
//!    the group instead of merging distinct content.
//!
//! Neither stage mutates the store or the filesystem.

pub mod index;
pub mod verify;

pub use index::HashIndex;
pub use verify::{verify_group, GroupVerification, VerifiedGroup};
