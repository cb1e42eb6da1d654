use std::path::Path;

use filetime::FileTime;

use relsync_core::diff::{self, Change};
use relsync_core::manifest::{EntryContent, FileEntry, Manifest};

fn file(mtime: i64, fsize: u64) -> FileEntry {
    FileEntry {
        mtime,
        fsize,
        content: EntryContent::File {
            parts: vec!["p".to_string()],
            part_sizes: vec![fsize],
        },
    }
}

fn dir(mtime: i64) -> FileEntry {
    FileEntry {
        mtime,
        fsize: 0,
        content: EntryContent::Directory,
    }
}

fn manifest(version: u32, entries: &[(&str, FileEntry)]) -> Manifest {
    Manifest {
        version,
        files: entries
            .iter()
            .map(|(p, e)| (p.to_string(), e.clone()))
            .collect(),
    }
}

/// Write a file under `base` whose size and mtime match `entry`.
fn write_matching(base: &Path, path: &str, entry: &FileEntry) {
    let full = base.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&full, vec![0u8; entry.fsize as usize]).unwrap();
    filetime::set_file_mtime(&full, FileTime::from_unix_time(entry.mtime, 0)).unwrap();
}

#[test]
fn identical_manifests_diff_to_nothing() {
    let m = manifest(10, &[("a", file(100, 5)), ("d", dir(1)), ("b", file(200, 9))]);
    assert!(diff::diff_manifests(&m, &m).is_empty());
}

#[test]
fn one_sided_paths_become_create_and_delete() {
    // spec scenario: v10 {a:100, b:200}, v11 {a:100, c:300}
    let v10 = manifest(10, &[("a", file(100, 5)), ("b", file(200, 9))]);
    let v11 = manifest(11, &[("a", file(100, 5)), ("c", file(300, 7))]);

    let changes = diff::diff_manifests(&v10, &v11);
    assert_eq!(changes.len(), 2);
    assert!(matches!(changes.get("c"), Some(Change::Create(e)) if e.mtime == 300));
    assert_eq!(changes.get("b"), Some(&Change::Delete));
    assert!(!changes.contains_key("a"));
}

#[test]
fn changed_mtime_becomes_update() {
    let old = manifest(1, &[("a", file(100, 5))]);
    let new = manifest(2, &[("a", file(101, 5))]);
    let changes = diff::diff_manifests(&old, &new);
    assert!(matches!(changes.get("a"), Some(Change::Update(e)) if e.mtime == 101));
}

#[test]
fn mtime_is_the_sole_equality_signal() {
    // Same mtime but different size and parts: never emitted. This mirrors
    // the depot's own change detection.
    let old = manifest(1, &[("a", file(100, 5))]);
    let mut changed = file(100, 999);
    if let EntryContent::File { parts, .. } = &mut changed.content {
        parts[0] = "different-part".to_string();
    }
    let new = manifest(2, &[("a", changed)]);
    assert!(diff::diff_manifests(&old, &new).is_empty());
}

#[test]
fn matching_tree_diffs_to_nothing() {
    let td = tempfile::tempdir().unwrap();
    let m = manifest(
        3,
        &[
            ("data", dir(1)),
            ("data/a.bin", file(100, 16)),
            ("b.bin", file(200, 4)),
        ],
    );
    for (path, entry) in &m.files {
        if entry.is_directory() {
            std::fs::create_dir_all(td.path().join(path)).unwrap();
        } else {
            write_matching(td.path(), path, entry);
        }
    }
    assert!(diff::diff_with_filesystem(td.path(), &m).is_empty());
}

#[test]
fn missing_and_mismatched_paths_are_detected() {
    let td = tempfile::tempdir().unwrap();
    let m = manifest(
        3,
        &[
            ("missing.bin", file(100, 8)),
            ("stale.bin", file(100, 8)),
            ("short.bin", file(100, 8)),
            ("good.bin", file(100, 8)),
        ],
    );
    write_matching(td.path(), "good.bin", &m.files["good.bin"]);
    write_matching(td.path(), "short.bin", &file(100, 3)); // wrong size
    write_matching(td.path(), "stale.bin", &file(50, 8)); // wrong mtime

    let changes = diff::diff_with_filesystem(td.path(), &m);
    assert!(matches!(changes.get("missing.bin"), Some(Change::Create(_))));
    assert!(matches!(changes.get("stale.bin"), Some(Change::Update(_))));
    assert!(matches!(changes.get("short.bin"), Some(Change::Update(_))));
    assert!(!changes.contains_key("good.bin"));
}

#[test]
fn filesystem_diff_never_deletes_local_extras() {
    let td = tempfile::tempdir().unwrap();
    let m = manifest(3, &[("a.bin", file(100, 4))]);
    write_matching(td.path(), "a.bin", &m.files["a.bin"]);
    std::fs::write(td.path().join("local-only.txt"), b"keep me").unwrap();

    let changes = diff::diff_with_filesystem(td.path(), &m);
    assert!(changes.is_empty());
}

#[test]
fn wrong_kind_in_the_way_is_a_create() {
    let td = tempfile::tempdir().unwrap();
    let m = manifest(3, &[("a.bin", file(100, 4)), ("d", dir(1))]);
    // A directory where a file should be, and a file where a directory
    // should be.
    std::fs::create_dir_all(td.path().join("a.bin")).unwrap();
    std::fs::write(td.path().join("d"), b"not a dir").unwrap();

    let changes = diff::diff_with_filesystem(td.path(), &m);
    assert!(matches!(changes.get("a.bin"), Some(Change::Create(_))));
    assert!(matches!(changes.get("d"), Some(Change::Create(_))));
}

#[test]
fn spec_scenario_missing_file_only() {
    // Local disk has `a` matching v11 and no `c`: only {c: create}.
    let td = tempfile::tempdir().unwrap();
    let v11 = manifest(11, &[("a", file(100, 5)), ("c", file(300, 7))]);
    write_matching(td.path(), "a", &v11.files["a"]);

    let changes = diff::diff_with_filesystem(td.path(), &v11);
    assert_eq!(changes.len(), 1);
    assert!(matches!(changes.get("c"), Some(Change::Create(_))));
}

#[test]
fn refilter_drops_satisfied_entries_and_keeps_deletes() {
    let td = tempfile::tempdir().unwrap();
    let done = file(100, 6);
    let pending = file(200, 4);
    write_matching(td.path(), "done.bin", &done);

    let mut changes = diff::ChangeSet::new();
    changes.insert("done.bin".to_string(), Change::Update(done));
    changes.insert("pending.bin".to_string(), Change::Update(pending));
    changes.insert("gone.bin".to_string(), Change::Delete);

    let filtered = diff::refilter_against_filesystem(td.path(), changes);
    assert_eq!(filtered.len(), 2);
    assert!(!filtered.contains_key("done.bin"));
    // Not on disk at all: resume refines the action to Create.
    assert!(matches!(filtered.get("pending.bin"), Some(Change::Create(_))));
    assert_eq!(filtered.get("gone.bin"), Some(&Change::Delete));
}
