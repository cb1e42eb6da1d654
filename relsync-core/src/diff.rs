//! Change-set computation.
//!
//! Both diff variants are pure over their inputs: no network, no
//! filesystem mutation. `diff_manifests` compares two release manifests;
//! `diff_with_filesystem` compares one manifest against the live tree and
//! is what makes interrupted runs resumable.

use std::collections::BTreeMap;
use std::path::Path;

use filetime::FileTime;

use crate::manifest::{EntryContent, FileEntry, Manifest};

/// Action needed to bring one path up to the target manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Create(FileEntry),
    Update(FileEntry),
    Delete,
}

impl Change {
    /// The entry to fetch, for non-delete actions.
    pub fn entry(&self) -> Option<&FileEntry> {
        match self {
            Change::Create(e) | Change::Update(e) => Some(e),
            Change::Delete => None,
        }
    }
}

/// Path -> action. Paths not present are unchanged.
pub type ChangeSet = BTreeMap<String, Change>;

/// Change-set moving an installation at `older` to `newer`.
///
/// `mtime` is the sole equality signal, matching the depot's own change
/// detection: a path present in both manifests with an unchanged `mtime`
/// is never emitted, even if its part list changed. This can under-detect
/// content drift if the depot ever reuses an mtime; known limitation,
/// kept for fidelity with the authoritative server.
pub fn diff_manifests(older: &Manifest, newer: &Manifest) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for (path, entry) in &newer.files {
        match older.files.get(path) {
            None => {
                changes.insert(path.clone(), Change::Create(entry.clone()));
            }
            Some(old) if old.mtime != entry.mtime => {
                changes.insert(path.clone(), Change::Update(entry.clone()));
            }
            Some(_) => {}
        }
    }
    for path in older.files.keys() {
        if !newer.files.contains_key(path) {
            changes.insert(path.clone(), Change::Delete);
        }
    }
    changes
}

/// Change-set moving the tree under `base` to `manifest`.
///
/// Stats every manifest path: missing or inaccessible (including a wrong
/// kind in the way) is a Create, a `(size, mtime)` mismatch is an Update.
/// Never emits Delete — local-only files are left untouched; only
/// [`diff_manifests`] prunes paths the depot explicitly removed.
pub fn diff_with_filesystem(base: &Path, manifest: &Manifest) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for (path, entry) in &manifest.files {
        match disk_state(base, path, entry) {
            DiskState::Match => {}
            DiskState::Mismatch => {
                changes.insert(path.clone(), Change::Update(entry.clone()));
            }
            DiskState::Missing => {
                changes.insert(path.clone(), Change::Create(entry.clone()));
            }
        }
    }
    changes
}

/// Drop Create/Update entries already satisfied on disk; used by resumable
/// upgrades so files the previous run completed are not fetched again.
/// Delete entries pass through untouched.
pub fn refilter_against_filesystem(base: &Path, changes: ChangeSet) -> ChangeSet {
    changes
        .into_iter()
        .filter_map(|(path, change)| match change {
            Change::Delete => Some((path, Change::Delete)),
            Change::Create(entry) | Change::Update(entry) => {
                match disk_state(base, &path, &entry) {
                    DiskState::Match => None,
                    DiskState::Mismatch => Some((path, Change::Update(entry))),
                    DiskState::Missing => Some((path, Change::Create(entry))),
                }
            }
        })
        .collect()
}

enum DiskState {
    Match,
    Mismatch,
    Missing,
}

fn disk_state(base: &Path, path: &str, entry: &FileEntry) -> DiskState {
    let full = base.join(path);
    let md = match std::fs::metadata(&full) {
        Ok(md) => md,
        Err(_) => return DiskState::Missing,
    };
    match entry.content {
        EntryContent::Directory => {
            if md.is_dir() {
                DiskState::Match
            } else {
                DiskState::Missing
            }
        }
        EntryContent::File { .. } => {
            if !md.is_file() {
                return DiskState::Missing;
            }
            let mtime = FileTime::from_last_modification_time(&md).unix_seconds();
            if md.len() == entry.fsize && mtime == entry.mtime {
                DiskState::Match
            } else {
                DiskState::Mismatch
            }
        }
    }
}
