//! Part fetcher: download, decompress, and reassemble file content.
//!
//! Files are independent once reconciliation has run, so they download
//! concurrently on the rayon pool. Within one file the parts are a strict
//! ordered concatenation and are fetched sequentially. A single file's
//! failure is logged and its partial output removed; it never aborts the
//! batch.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use filetime::FileTime;
use rayon::prelude::*;

use crate::error::{io_err, Result, SyncError};
use crate::manifest::{EntryContent, FileEntry};
use crate::progress::Progress;
use crate::reconcile::remove_if_exists;
use crate::transport::{inflate, RemoteSource};

/// Outcome summary of one download batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub files_ok: u64,
    pub files_failed: u64,
    pub bytes_written: u64,
    /// Parts whose decompressed length disagreed with the manifest. These
    /// are warnings, not failures: the depot's size reporting has
    /// historically been inconsistent between compressed and decompressed
    /// figures, so declared sizes are a best-effort signal only.
    pub size_mismatches: u64,
}

impl FetchReport {
    pub fn all_ok(&self) -> bool {
        self.files_failed == 0
    }

    fn merge(mut self, other: FetchReport) -> FetchReport {
        self.files_ok += other.files_ok;
        self.files_failed += other.files_failed;
        self.bytes_written += other.bytes_written;
        self.size_mismatches += other.size_mismatches;
        self
    }
}

struct FileOutcome {
    bytes: u64,
    mismatches: u64,
}

/// Download every entry of `files` into the tree under `base`.
///
/// Callers must have reconciled the change-set first: parent directories
/// exist, stale files are gone.
pub fn download_files(
    remote: &dyn RemoteSource,
    base: &Path,
    files: &BTreeMap<String, FileEntry>,
    progress: &Progress,
) -> FetchReport {
    progress.set_files_total(files.len());
    progress.reset_bytes(files.values().map(|e| e.fsize).sum());

    files
        .par_iter()
        .map(|(path, entry)| {
            let outcome = match download_one(remote, base, path, entry, progress) {
                Ok(o) => FetchReport {
                    files_ok: 1,
                    bytes_written: o.bytes,
                    size_mismatches: o.mismatches,
                    ..FetchReport::default()
                },
                Err(err) => {
                    log::warn!("skipping {path}: {err}");
                    // Best-effort cleanup of a partially-written file; a
                    // conflicting directory in the way is left for the next
                    // resume run to report.
                    let dest = base.join(path);
                    if !entry.is_directory() && dest.is_file() {
                        if let Err(e) = remove_if_exists(&dest) {
                            log::warn!("could not clean up partial {path}: {e}");
                        }
                    }
                    FetchReport {
                        files_failed: 1,
                        ..FetchReport::default()
                    }
                }
            };
            progress.inc_file();
            outcome
        })
        .reduce(FetchReport::default, FetchReport::merge)
}

fn download_one(
    remote: &dyn RemoteSource,
    base: &Path,
    path: &str,
    entry: &FileEntry,
    progress: &Progress,
) -> Result<FileOutcome> {
    let dest = base.join(path);
    let (parts, part_sizes) = match &entry.content {
        EntryContent::Directory => {
            std::fs::create_dir_all(&dest).map_err(|e| io_err(&dest, e))?;
            return Ok(FileOutcome {
                bytes: 0,
                mismatches: 0,
            });
        }
        EntryContent::File { parts, part_sizes } => (parts, part_sizes),
    };

    let mut out = File::create(&dest).map_err(|e| io_err(&dest, e))?;
    let mut written = 0u64;
    let mut mismatches = 0u64;
    for (id, &expected) in parts.iter().zip(part_sizes) {
        let raw = remote.part(id)?;
        let data = inflate(&raw).map_err(|e| {
            SyncError::retrieval(format!("part {id}"), format!("inflate failed: {e}"))
        })?;
        if data.len() as u64 != expected {
            mismatches += 1;
            log::warn!(
                "{path}: part {id} decompressed to {} bytes, expected {expected} (raw {})",
                data.len(),
                raw.len()
            );
        }
        out.write_all(&data).map_err(|e| io_err(&dest, e))?;
        written += data.len() as u64;
        progress.add_bytes(data.len() as u64);
    }
    drop(out);

    // Restore the recorded mtime; access time is left alone.
    filetime::set_file_mtime(&dest, FileTime::from_unix_time(entry.mtime, 0))
        .map_err(|e| io_err(&dest, e))?;

    log::debug!("wrote {path} ({written} bytes, {} parts)", parts.len());
    Ok(FileOutcome {
        bytes: written,
        mismatches,
    })
}
