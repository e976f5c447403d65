use relinker::engine::{run_over_roots, Engine, EngineConfig};
use relinker::scanner::WalkerConfig;
use relinker::store::{HashWrite, MetaStore, StaleState};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn mtime(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn test_store_survives_process_restart() {
    let data = tempdir().unwrap();
    let db = tempdir().unwrap();
    let db_path = db.path().join("metadata.db");
    write_file(data.path(), "a.txt", b"persistent");
    write_file(data.path(), "b.txt", b"persistent");

    // First "process"
    {
        let engine = Engine::new(MetaStore::open(&db_path).unwrap(), EngineConfig::default());
        let report = run_over_roots(
            &engine,
            &[data.path().to_path_buf()],
            &WalkerConfig::default(),
        )
        .unwrap();
        assert_eq!(report.summary.hashes_computed, 2);
    }

    // Second "process" reuses the persisted hashes. Linking changed
    // the files' mtimes, so only the canonical side stays fresh; the
    // point is that the store, not the run, carries the knowledge.
    let engine = Engine::new(MetaStore::open(&db_path).unwrap(), EngineConfig::default());
    let report = run_over_roots(
        &engine,
        &[data.path().to_path_buf()],
        &WalkerConfig::default(),
    )
    .unwrap();
    assert_eq!(report.summary.members_already_linked, 1);
}

#[test]
fn test_upsert_same_observation_keeps_hash() {
    let store = MetaStore::open_in_memory().unwrap();
    let path = Path::new("/data/file");

    assert_eq!(
        store.upsert(path, 100, mtime(500)).unwrap(),
        StaleState::NeedsHash
    );
    store
        .record_hash(path, 100, mtime(500), &[3u8; 32])
        .unwrap();

    // Re-reporting identical metadata does not invalidate
    assert_eq!(
        store.upsert(path, 100, mtime(500)).unwrap(),
        StaleState::Fresh
    );
    assert_eq!(store.snapshot().unwrap().len(), 1);
}

#[test]
fn test_optimistic_commit_rejected_after_change() {
    let store = MetaStore::open_in_memory().unwrap();
    let path = Path::new("/data/file");

    store.upsert(path, 100, mtime(500)).unwrap();

    // A hashing worker started against (100, t500); meanwhile the
    // scanner observed a newer version
    store.upsert(path, 120, mtime(501)).unwrap();

    let write = store.record_hash(path, 100, mtime(500), &[3u8; 32]).unwrap();
    assert_eq!(write, HashWrite::Superseded);

    // The row is still unhashed; grouping cannot see it
    assert!(store.snapshot().unwrap().is_empty());

    // Retrying with the current observation succeeds
    let write = store.record_hash(path, 120, mtime(501), &[4u8; 32]).unwrap();
    assert_eq!(write, HashWrite::Committed);
    assert_eq!(store.snapshot().unwrap()[0].hash, Some([4u8; 32]));
}

#[test]
fn test_removed_rows_do_not_linger() {
    let store = MetaStore::open_in_memory().unwrap();
    let path = Path::new("/data/file");

    store.upsert(path, 100, mtime(500)).unwrap();
    store
        .record_hash(path, 100, mtime(500), &[3u8; 32])
        .unwrap();
    assert!(store.remove(path).unwrap());

    assert!(store.snapshot().unwrap().is_empty());
    assert!(store.get(path).unwrap().is_none());
}

#[test]
fn test_snapshot_is_ordered_and_complete() {
    let store = MetaStore::open_in_memory().unwrap();
    for (i, name) in ["/z", "/m", "/a"].iter().enumerate() {
        let path = Path::new(name);
        store.upsert(path, 10, mtime(100)).unwrap();
        store
            .record_hash(path, 10, mtime(100), &[i as u8; 32])
            .unwrap();
    }

    let snapshot = store.snapshot().unwrap();
    let paths: Vec<_> = snapshot.iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("/a"), PathBuf::from("/m"), PathBuf::from("/z")]
    );
    assert!(snapshot.iter().all(|r| r.is_hashed()));
}
