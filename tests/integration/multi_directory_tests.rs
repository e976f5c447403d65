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

#[test]
#[cfg(unix)]
fn test_duplicates_across_roots_are_linked() {
    use std::os::unix::fs::MetadataExt;

    // Two sibling trees under one tempdir share a filesystem, so
    // hard links between them are possible
    let base = tempdir().unwrap();
    let root_a = base.path().join("tree_a");
    let root_b = base.path().join("tree_b");
    fs::create_dir_all(&root_a).unwrap();
    fs::create_dir_all(&root_b).unwrap();

    let a = write_file(&root_a, "photo.jpg", b"image bytes");
    let b = write_file(&root_b, "photo_copy.jpg", b"image bytes");

    let engine = Engine::new(MetaStore::open_in_memory().unwrap(), EngineConfig::default());
    let report = run_over_roots(
        &engine,
        &[root_a.clone(), root_b.clone()],
        &WalkerConfig::default(),
    )
    .unwrap();

    assert_eq!(report.summary.groups_found, 1);
    assert_eq!(report.summary.members_linked, 1);
    assert_eq!(
        fs::metadata(&a).unwrap().ino(),
        fs::metadata(&b).unwrap().ino()
    );
}

#[test]
fn test_prune_only_touches_scanned_roots() {
    let base = tempdir().unwrap();
    let scanned = base.path().join("scanned");
    let other = base.path().join("other");
    fs::create_dir_all(&scanned).unwrap();
    fs::create_dir_all(&other).unwrap();

    let in_scanned = write_file(&scanned, "a.txt", b"data");
    let in_other = write_file(&other, "b.txt", b"data");

    let engine = Engine::new(MetaStore::open_in_memory().unwrap(), EngineConfig::default());

    // Seed the store from both roots
    run_over_roots(
        &engine,
        &[scanned.clone(), other.clone()],
        &WalkerConfig::default(),
    )
    .unwrap();
    assert_eq!(engine.store().len().unwrap(), 2);

    // Delete both files, but rescan only one root
    fs::remove_file(&in_scanned).unwrap();
    fs::remove_file(&in_other).unwrap();
    let report = run_over_roots(&engine, &[scanned.clone()], &WalkerConfig::default()).unwrap();

    // Only the scanned root's record is pruned
    assert_eq!(report.summary.records_pruned, 1);
    assert!(engine.store().get(&in_scanned).unwrap().is_none());
    assert!(engine.store().get(&in_other).unwrap().is_some());
}

#[test]
fn test_walker_filters_apply_per_run() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "tiny_a", b"xy");
    write_file(dir.path(), "tiny_b", b"xy");
    write_file(dir.path(), "big_a", &[9u8; 4096]);
    write_file(dir.path(), "big_b", &[9u8; 4096]);

    let engine = Engine::new(MetaStore::open_in_memory().unwrap(), EngineConfig::default());
    let config = WalkerConfig::default().with_min_size(Some(1024));
    let report = run_over_roots(&engine, &[dir.path().to_path_buf()], &config).unwrap();

    // Only the big pair was even observed
    assert_eq!(report.summary.files_scanned, 2);
    assert_eq!(report.summary.groups_found, 1);
}
