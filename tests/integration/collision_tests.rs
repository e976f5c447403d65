//! An engineered hash collision must never cause two distinct files to
//! be merged. Real BLAKE3 collisions cannot be produced, so the forged
//! digest is injected at the store layer and the detection stages run
//! over the poisoned snapshot.

use relinker::consolidate::{consolidate_group, ConsolidateMode};
use relinker::duplicates::{verify_group, HashIndex};
use relinker::store::MetaStore;
use std::fs::{self, File};
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
fn test_forged_collision_is_split_not_merged() {
    let dir = tempdir().unwrap();
    // Same size, different content, and (by injection) the same hash
    let x = write_file(dir.path(), "x.bin", b"AAAAAAAA");
    let y = write_file(dir.path(), "y.bin", b"BBBBBBBB");

    let store = MetaStore::open_in_memory().unwrap();
    let forged = [0xEEu8; 32];
    for path in [&x, &y] {
        store.upsert(path, 8, mtime(1000)).unwrap();
        store.record_hash(path, 8, mtime(1000), &forged).unwrap();
    }

    let index = HashIndex::build(store.snapshot().unwrap());
    assert_eq!(index.duplicate_group_count(), 1, "forged group must form");

    let (_, members) = index.duplicate_groups().next().unwrap();
    let outcome = verify_group(members);

    // Byte comparison catches the forgery and splits the group
    assert!(outcome.split);
    assert!(outcome.verified.is_empty());
    assert_eq!(outcome.singletons.len(), 2);

    // Nothing was linked; both files keep their content
    assert_eq!(fs::read(&x).unwrap(), b"AAAAAAAA");
    assert_eq!(fs::read(&y).unwrap(), b"BBBBBBBB");
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        assert_ne!(
            fs::metadata(&x).unwrap().ino(),
            fs::metadata(&y).unwrap().ino()
        );
    }
}

#[test]
fn test_collision_with_real_pair_links_only_the_pair() {
    let dir = tempdir().unwrap();
    // Two genuinely identical files plus one forged into their group
    let a = write_file(dir.path(), "a.bin", b"yes yes!");
    let b = write_file(dir.path(), "b.bin", b"yes yes!");
    let odd = write_file(dir.path(), "odd.bin", b"not that");

    let store = MetaStore::open_in_memory().unwrap();
    let forged = [0x42u8; 32];
    for path in [&a, &b, &odd] {
        store.upsert(path, 8, mtime(1000)).unwrap();
        store.record_hash(path, 8, mtime(1000), &forged).unwrap();
    }

    let index = HashIndex::build(store.snapshot().unwrap());
    let (_, members) = index.duplicate_groups().next().unwrap();
    let outcome = verify_group(members);

    assert!(outcome.split);
    assert_eq!(outcome.verified.len(), 1);
    assert_eq!(outcome.singletons.len(), 1);
    assert!(outcome.singletons[0].path.ends_with("odd.bin"));

    let report = consolidate_group(&outcome.verified[0], ConsolidateMode::Apply);
    assert_eq!(report.linked_count(), 1);
    assert_eq!(report.failed_count(), 0);

    // The odd one out is untouched
    assert_eq!(fs::read(&odd).unwrap(), b"not that");
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        assert_eq!(
            fs::metadata(&a).unwrap().ino(),
            fs::metadata(&b).unwrap().ino()
        );
        assert_ne!(
            fs::metadata(&a).unwrap().ino(),
            fs::metadata(&odd).unwrap().ino()
        );
    }
}

#[test]
fn test_vanished_member_excluded_with_warning() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.bin", b"content!");
    let b = write_file(dir.path(), "b.bin", b"content!");
    let ghost = dir.path().join("ghost.bin");
    write_file(dir.path(), "ghost.bin", b"content!");

    let store = MetaStore::open_in_memory().unwrap();
    let hash = [7u8; 32];
    for path in [&a, &b, &ghost] {
        store.upsert(path, 8, mtime(1000)).unwrap();
        store.record_hash(path, 8, mtime(1000), &hash).unwrap();
    }

    // The file disappears between snapshot and verification
    fs::remove_file(&ghost).unwrap();

    let index = HashIndex::build(store.snapshot().unwrap());
    let (_, members) = index.duplicate_groups().next().unwrap();
    let outcome = verify_group(members);

    assert_eq!(outcome.skipped.len(), 1);
    assert!(outcome.skipped[0].path.ends_with("ghost.bin"));
    // The surviving pair is still consolidated
    assert_eq!(outcome.verified.len(), 1);
    assert_eq!(outcome.verified[0].member_count(), 2);
}
