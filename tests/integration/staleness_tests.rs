use relinker::engine::{run_over_roots, Engine, EngineConfig};
use relinker::scanner::WalkerConfig;
use relinker::store::MetaStore;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn set_mtime(path: &Path, secs: i64) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(secs, 0)).unwrap();
}

fn engine() -> Engine {
    Engine::new(MetaStore::open_in_memory().unwrap(), EngineConfig::default())
}

fn run(engine: &Engine, root: &Path) -> relinker::engine::RunReport {
    run_over_roots(engine, &[root.to_path_buf()], &WalkerConfig::default()).unwrap()
}

#[test]
fn test_unchanged_files_are_not_rehashed() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"stable");
    write_file(dir.path(), "b.txt", b"other data");

    let engine = engine();
    let first = run(&engine, dir.path());
    assert_eq!(first.summary.hashes_computed, 2);

    let second = run(&engine, dir.path());
    assert_eq!(second.summary.hashes_computed, 0);
    assert_eq!(second.summary.hashes_reused, 2);
}

#[test]
fn test_mtime_change_forces_rehash() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", b"stable");
    set_mtime(&path, 1_000_000);

    let engine = engine();
    run(&engine, dir.path());

    set_mtime(&path, 2_000_000);
    let report = run(&engine, dir.path());

    assert_eq!(report.summary.hashes_computed, 1);
}

#[test]
fn test_size_change_forces_rehash() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", b"short");
    set_mtime(&path, 1_000_000);

    let engine = engine();
    run(&engine, dir.path());

    // Same mtime, different size: still stale
    fs::write(&path, b"much longer now").unwrap();
    set_mtime(&path, 1_000_000);
    let report = run(&engine, dir.path());

    assert_eq!(report.summary.hashes_computed, 1);
}

#[test]
#[cfg(unix)]
fn test_rewritten_file_regroups_correctly() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"group one");
    let b = write_file(dir.path(), "b.txt", b"group one");
    let c = write_file(dir.path(), "c.txt", b"group two");

    let engine = engine();
    run(&engine, dir.path());
    assert_eq!(
        fs::metadata(&a).unwrap().ino(),
        fs::metadata(&b).unwrap().ino()
    );

    // b leaves its group: break the link by rewriting it with new content
    fs::remove_file(&b).unwrap();
    write_file(dir.path(), "b.txt", b"group two");

    let report = run(&engine, dir.path());

    // The stale b was rehashed into c's group before any decision
    assert_eq!(report.summary.hashes_computed, 1);
    assert_eq!(
        fs::metadata(&b).unwrap().ino(),
        fs::metadata(&c).unwrap().ino()
    );
    assert_ne!(
        fs::metadata(&a).unwrap().ino(),
        fs::metadata(&b).unwrap().ino()
    );
}

#[test]
fn test_deleted_file_pruned_from_store() {
    let dir = tempdir().unwrap();
    let keep = write_file(dir.path(), "keep.txt", b"stay");
    let gone = write_file(dir.path(), "gone.txt", b"vanish");

    let engine = engine();
    run(&engine, dir.path());
    assert_eq!(engine.store().len().unwrap(), 2);

    fs::remove_file(&gone).unwrap();
    let report = run(&engine, dir.path());

    assert_eq!(report.summary.records_pruned, 1);
    assert_eq!(engine.store().len().unwrap(), 1);
    assert!(engine.store().get(&keep).unwrap().is_some());
    assert!(engine.store().get(&gone).unwrap().is_none());
}
