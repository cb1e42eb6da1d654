//! Structural filesystem reconciliation.
//!
//! Applies a change-set's side effects — parent directory creation and
//! deletions — before any content is fetched, so partial part-writes never
//! target a nonexistent directory and deletions never race file workers.

use std::io;
use std::path::Path;

use crate::diff::{Change, ChangeSet};
use crate::error::{io_err, Result};

/// Apply the structural half of `changes` under `base`.
///
/// Idempotent: directory creation tolerates pre-existing trees and
/// deleting an already-missing target is a no-op.
pub fn apply(base: &Path, changes: &ChangeSet) -> Result<()> {
    let mut created = 0usize;
    let mut deleted = 0usize;
    for (path, change) in changes {
        let full = base.join(path);
        match change {
            Change::Delete => {
                if remove_if_exists(&full).map_err(|e| io_err(&full, e))? {
                    deleted += 1;
                }
            }
            Change::Create(_) | Change::Update(_) => {
                if let Some(parent) = full.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                        created += 1;
                    }
                }
            }
        }
    }
    log::debug!("reconciled: {created} directory trees created, {deleted} files deleted");
    Ok(())
}

/// Remove a path if present — a file, or a directory tree when the depot
/// dropped a whole directory. Returns whether anything was removed; a
/// missing target is success, any other failure is a real error.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
        Ok(md) => {
            if md.is_dir() {
                std::fs::remove_dir_all(path)?;
            } else {
                std::fs::remove_file(path)?;
            }
            Ok(true)
        }
    }
}
