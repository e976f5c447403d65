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

fn engine() -> Engine {
    Engine::new(MetaStore::open_in_memory().unwrap(), EngineConfig::default())
}

fn run(engine: &Engine, root: &Path) -> relinker::engine::RunReport {
    run_over_roots(engine, &[root.to_path_buf()], &WalkerConfig::default()).unwrap()
}

#[cfg(unix)]
fn inode(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).unwrap().ino()
}

#[test]
#[cfg(unix)]
fn test_three_identical_files_share_one_inode() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"hello");
    let b = write_file(dir.path(), "b.txt", b"hello");
    let c = write_file(dir.path(), "c.txt", b"hello");
    let d = write_file(dir.path(), "d.txt", b"world");

    let engine = engine();
    let report = run(&engine, dir.path());

    // a, b, c collapse onto one storage object
    assert_eq!(inode(&a), inode(&b));
    assert_eq!(inode(&b), inode(&c));
    // d is untouched and keeps its own storage
    assert_ne!(inode(&a), inode(&d));

    // Content is preserved everywhere
    for path in [&a, &b, &c] {
        assert_eq!(fs::read(path).unwrap(), b"hello");
    }
    assert_eq!(fs::read(&d).unwrap(), b"world");

    assert_eq!(report.summary.groups_found, 1);
    assert_eq!(report.summary.members_linked, 2);
    assert_eq!(report.summary.bytes_reclaimed, 10);
}

#[test]
#[cfg(unix)]
fn test_canonical_is_oldest_then_smallest_path() {
    let dir = tempdir().unwrap();
    let newer = write_file(dir.path(), "newer.txt", b"same bytes");
    let older = write_file(dir.path(), "older.txt", b"same bytes");

    filetime::set_file_mtime(&older, filetime::FileTime::from_unix_time(1_000_000, 0)).unwrap();
    filetime::set_file_mtime(&newer, filetime::FileTime::from_unix_time(2_000_000, 0)).unwrap();

    let engine = engine();
    let report = run(&engine, dir.path());

    assert_eq!(report.groups.len(), 1);
    assert!(report.groups[0].canonical.ends_with("older.txt"));
}

#[test]
#[cfg(unix)]
fn test_second_run_makes_zero_new_links() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"payload");
    write_file(dir.path(), "b.txt", b"payload");
    write_file(dir.path(), "c.txt", b"payload");

    let engine = engine();
    let first = run(&engine, dir.path());
    assert_eq!(first.summary.members_linked, 2);

    let second = run(&engine, dir.path());
    assert_eq!(second.summary.members_linked, 0);
    assert_eq!(second.summary.members_already_linked, 2);
    assert_eq!(second.summary.bytes_reclaimed, 0);
}

#[test]
#[cfg(unix)]
fn test_preexisting_hardlinks_reported_already_linked() {
    let dir = tempdir().unwrap();
    let original = write_file(dir.path(), "original.txt", b"content");
    let link = dir.path().join("link.txt");
    fs::hard_link(&original, &link).unwrap();

    let engine = engine();
    let report = run(&engine, dir.path());

    assert_eq!(report.summary.members_linked, 0);
    assert_eq!(report.summary.members_already_linked, 1);
}

#[test]
#[cfg(unix)]
fn test_dry_run_leaves_filesystem_untouched() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"hello");
    let b = write_file(dir.path(), "b.txt", b"hello");

    let engine = Engine::new(
        MetaStore::open_in_memory().unwrap(),
        EngineConfig::default().with_dry_run(true),
    );
    let report = run(&engine, dir.path());

    assert_ne!(inode(&a), inode(&b));
    assert_eq!(report.summary.bytes_reclaimed, 0);
    assert_eq!(report.summary.bytes_reclaimable, 5);
    // Dry-run still verifies: the group is real
    assert_eq!(report.groups.len(), 1);
}

#[test]
#[cfg(unix)]
fn test_crash_leftover_keeps_original_readable() {
    let dir = tempdir().unwrap();
    let canonical = write_file(dir.path(), "canonical.txt", b"crash test content");
    let dup = write_file(dir.path(), "dup.txt", b"crash test content");

    // Simulate a crash between temp-link creation and rename: the temp
    // link exists, the original path is untouched
    let tmp = dir
        .path()
        .join(format!(".dup.txt.{}.relink-tmp", std::process::id()));
    fs::hard_link(&canonical, &tmp).unwrap();

    assert_eq!(fs::read(&dup).unwrap(), b"crash test content");

    // The next run recovers: stale temp removed, files linked
    let engine = engine();
    let report = run(&engine, dir.path());

    assert_eq!(report.summary.members_linked, 1);
    assert_eq!(inode(&canonical), inode(&dup));
    assert_eq!(fs::read(&dup).unwrap(), b"crash test content");
}

#[test]
#[cfg(unix)]
fn test_empty_files_are_consolidated() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "empty_a", b"");
    let b = write_file(dir.path(), "empty_b", b"");

    let engine = engine();
    let report = run(&engine, dir.path());

    // Zero-length files have a real digest and are true duplicates
    assert_eq!(report.summary.groups_found, 1);
    assert_eq!(inode(&a), inode(&b));
}

#[test]
fn test_unique_files_report_nothing_to_do() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"one");
    write_file(dir.path(), "b.txt", b"two words");

    let engine = engine();
    let report = run(&engine, dir.path());

    assert!(!report.found_duplicates());
    assert!(report.fully_succeeded());
    assert_eq!(report.summary.groups_found, 0);
}
