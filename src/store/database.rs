//! SQLite-backed metadata store.
//!
//! Schema: a single `files` table keyed by path, with indexes on size
//! and hash. WAL journal mode and a busy timeout keep readers from
//! blocking indefinitely behind writers. Every public operation is a
//! single statement or a single transaction, so a crash never leaves a
//! row half-written.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::record::{FileRecord, HashWrite, StaleState};
use crate::scanner::ContentHash;

/// Errors surfaced by the persistence layer.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// The database file could not be opened or created.
    #[error("failed to open metadata store at {path}: {source}")]
    Open {
        /// Database location
        path: PathBuf,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The parent directory for the database could not be created.
    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A query or statement failed.
    #[error("metadata store operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent table of file observations and their content hashes.
///
/// The store is the only component that writes persisted state; the
/// grouping and verification stages consume immutable [`FileRecord`]
/// snapshots taken via [`MetaStore::snapshot`].
pub struct MetaStore {
    conn: Mutex<Connection>,
}

impl MetaStore {
    /// Open or create a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the database cannot be opened or
    /// its schema cannot be initialized.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store. Used by tests and dry runs that should
    /// not touch a persisted database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if schema initialization fails.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        // WAL is a no-op for in-memory databases; ignore that failure
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                path        TEXT PRIMARY KEY,
                size        INTEGER NOT NULL,
                modified_ns INTEGER NOT NULL,
                hash        BLOB
            );
            CREATE INDEX IF NOT EXISTS idx_files_size ON files(size);
            CREATE INDEX IF NOT EXISTS idx_files_hash ON files(hash);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or update the observation for `path`.
    ///
    /// If the stored size or modification time differs from the
    /// observation, the stored hash is cleared in the same statement,
    /// so a stale digest can never survive a metadata change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure; the row is either
    /// fully updated or untouched.
    pub fn upsert(
        &self,
        path: &Path,
        size: u64,
        modified: SystemTime,
    ) -> StoreResult<StaleState> {
        let key = path_key(path);
        let modified_ns = system_time_to_ns(modified);

        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            r#"
            INSERT INTO files(path, size, modified_ns, hash)
            VALUES (?1, ?2, ?3, NULL)
            ON CONFLICT(path) DO UPDATE SET
                size = excluded.size,
                modified_ns = excluded.modified_ns,
                hash = CASE
                    WHEN files.size = excluded.size
                     AND files.modified_ns = excluded.modified_ns
                    THEN files.hash
                    ELSE NULL
                END
            "#,
            params![key, size as i64, modified_ns],
        )?;
        let has_hash: bool = tx.query_row(
            "SELECT hash IS NOT NULL FROM files WHERE path = ?1",
            params![key],
            |row| row.get(0),
        )?;
        tx.commit()?;

        Ok(if has_hash {
            StaleState::Fresh
        } else {
            StaleState::NeedsHash
        })
    }

    /// Record the digest for `path`, conditioned on the row still
    /// holding the size and modification time the digest was computed
    /// against.
    ///
    /// The write is a single conditioned UPDATE; if the file changed
    /// (or the row was removed) between hash start and commit, zero
    /// rows match and [`HashWrite::Superseded`] is returned so the
    /// caller can re-observe and retry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn record_hash(
        &self,
        path: &Path,
        size: u64,
        modified: SystemTime,
        hash: &ContentHash,
    ) -> StoreResult<HashWrite> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let rows = conn.execute(
            "UPDATE files SET hash = ?1 WHERE path = ?2 AND size = ?3 AND modified_ns = ?4",
            params![
                hash.as_slice(),
                path_key(path),
                size as i64,
                system_time_to_ns(modified)
            ],
        )?;

        Ok(if rows == 1 {
            HashWrite::Committed
        } else {
            HashWrite::Superseded
        })
    }

    /// Snapshot all rows that carry a current hash, ordered by path.
    ///
    /// The read happens inside one transaction, so concurrent upserts
    /// cannot produce a torn view. Rows without a hash are excluded;
    /// they must not participate in grouping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn snapshot(&self) -> StoreResult<Vec<FileRecord>> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction()?;
        let records = {
            let mut stmt = tx.prepare(
                "SELECT path, size, modified_ns, hash FROM files \
                 WHERE hash IS NOT NULL ORDER BY path ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (path, size, modified_ns, hash) = row?;
                let Ok(hash): Result<ContentHash, _> = hash.as_slice().try_into() else {
                    // Externally corrupted blob; exclude rather than
                    // poison a grouping decision
                    log::warn!("Ignoring malformed hash for {path} in metadata store");
                    continue;
                };
                records.push(FileRecord::new(
                    PathBuf::from(path),
                    size as u64,
                    ns_to_system_time(modified_ns),
                    Some(hash),
                ));
            }
            records
        };
        tx.commit()?;
        Ok(records)
    }

    /// Delete the row for `path`. Returns whether a row existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn remove(&self, path: &Path) -> StoreResult<bool> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let rows = conn.execute("DELETE FROM files WHERE path = ?1", params![path_key(path)])?;
        Ok(rows > 0)
    }

    /// Remove rows under any of `roots` whose path was not reported by
    /// the scanner this run. Rows outside the scanned roots are left
    /// alone so one database can serve several trees.
    ///
    /// Returns the removed paths.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn prune_missing(
        &self,
        roots: &[PathBuf],
        seen: &HashSet<PathBuf>,
    ) -> StoreResult<Vec<PathBuf>> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stale: Vec<PathBuf> = {
            let mut stmt = tx.prepare("SELECT path FROM files")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

            let mut stale = Vec::new();
            for row in rows {
                let path = PathBuf::from(row?);
                let in_scope = roots.iter().any(|root| path.starts_with(root));
                if in_scope && !seen.contains(&path) {
                    stale.push(path);
                }
            }
            stale
        };

        for path in &stale {
            tx.execute("DELETE FROM files WHERE path = ?1", params![path_key(path)])?;
        }
        tx.commit()?;

        if !stale.is_empty() {
            log::debug!("Pruned {} vanished path(s) from metadata store", stale.len());
        }
        Ok(stale)
    }

    /// Fetch a single row, hashed or not. Mainly useful for tests and
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn get(&self, path: &Path) -> StoreResult<Option<FileRecord>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let row = conn
            .query_row(
                "SELECT path, size, modified_ns, hash FROM files WHERE path = ?1",
                params![path_key(path)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(path, size, modified_ns, hash)| {
            let hash = hash.and_then(|blob| ContentHash::try_from(blob.as_slice()).ok());
            FileRecord::new(
                PathBuf::from(path),
                size as u64,
                ns_to_system_time(modified_ns),
                hash,
            )
        }))
    }

    /// Number of rows in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn len(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Whether the store has no rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on any SQLite failure.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Paths are stored as their lossless-if-possible string form; the
/// path itself is the primary key, matching how the scanner reports
/// observations.
fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn system_time_to_ns(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        // Pre-epoch mtimes exist on badly restored archives
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

fn ns_to_system_time(ns: i64) -> SystemTime {
    if ns >= 0 {
        UNIX_EPOCH + Duration::from_nanos(ns as u64)
    } else {
        UNIX_EPOCH - Duration::from_nanos(ns.unsigned_abs())
    }
}
