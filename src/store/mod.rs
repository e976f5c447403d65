//! Persistent file metadata store.
//!
//! One row per filesystem path: last-observed size, modification time,
//! and content hash. The store is the single source of truth for what
//! has been hashed and whether that hash can still be trusted.
//!
//! # Architecture
//!
//! * [`database`]: SQLite-backed persistence, schema management, and the
//!   single-record atomic operations.
//! * [`record`]: the value types callers hold ([`FileRecord`] and the
//!   upsert/hash-write outcomes).
//!
//! # Staleness
//!
//! A stored hash is trusted only while the row's size and modification
//! time match what the scanner last reported. `upsert` clears the hash
//! in the same statement that records a changed size/mtime, and
//! `record_hash` refuses to commit a digest if the row moved underneath
//! the hashing worker. A row whose hash column is NULL never
//! participates in grouping.

pub mod database;
pub mod record;

pub use database::{MetaStore, StoreError};
pub use record::{FileRecord, HashWrite, StaleState};
