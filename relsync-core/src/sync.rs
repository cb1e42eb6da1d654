//! Sync orchestrator: composes store, diff, reconciler and fetcher into
//! the five entry operations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::diff::{self, Change, ChangeSet};
use crate::error::Result;
use crate::fetch::{self, FetchReport};
use crate::manifest::{FileEntry, Manifest};
use crate::marker;
use crate::progress::Progress;
use crate::reconcile;
use crate::store::ManifestStore;
use crate::transport::RemoteSource;

/// Outcome of one orchestrated run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub to_version: u32,
    /// Entries fetched (created or updated).
    pub changed: usize,
    /// Entries removed from disk.
    pub deleted: usize,
    pub fetch: FetchReport,
}

pub struct Syncer<R> {
    store: ManifestStore<R>,
    base: PathBuf,
    progress: Progress,
}

impl<R: RemoteSource> Syncer<R> {
    pub fn new(remote: R, base: impl Into<PathBuf>) -> Self {
        Self {
            store: ManifestStore::new(remote),
            base: base.into(),
            progress: Progress::new(false),
        }
    }

    /// Enable the stderr progress ticker.
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.progress = Progress::new(enabled);
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Decoded manifest for `version` (dump mode and version probing).
    pub fn manifest(&mut self, version: u32) -> Result<std::sync::Arc<Manifest>> {
        self.store.get(version)
    }

    /// Build the installation from scratch: every manifest path is fetched.
    pub fn full_install(&mut self, version: u32) -> Result<SyncReport> {
        let manifest = self.store.get(version)?;
        let changes: ChangeSet = manifest
            .files
            .iter()
            .map(|(path, entry)| (path.clone(), Change::Create(entry.clone())))
            .collect();
        self.run(version, changes)
    }

    /// Advance a known-good `from` installation to `to`, downloading only
    /// what the manifests disagree on.
    pub fn upgrade(&mut self, from: u32, to: u32) -> Result<SyncReport> {
        let older = self.store.get(from)?;
        let newer = self.store.get(to)?;
        self.run(to, diff::diff_manifests(&older, &newer))
    }

    /// Continue an interrupted full install: trust the filesystem, not
    /// prior progress, and fetch only missing or mismatched entries.
    pub fn resume_install(&mut self, version: u32) -> Result<SyncReport> {
        let manifest = self.store.get(version)?;
        let changes = diff::diff_with_filesystem(&self.base, &manifest);
        self.run(version, changes)
    }

    /// Continue an interrupted upgrade: the manifest-to-manifest change-set
    /// re-filtered against disk so completed files are skipped.
    pub fn resume_upgrade(&mut self, from: u32, to: u32) -> Result<SyncReport> {
        let older = self.store.get(from)?;
        let newer = self.store.get(to)?;
        let changes = diff::refilter_against_filesystem(
            &self.base,
            diff::diff_manifests(&older, &newer),
        );
        self.run(to, changes)
    }

    /// Fill in missing endpoints of an upgrade request.
    ///
    /// Only a target: source is target − 1. Neither: source comes from the
    /// local marker (recovering to target − 1 if it is missing or corrupt)
    /// and target from the depot's version listing. Equal endpoints are
    /// forced apart by one so at least one version is diffed.
    pub fn resolve_versions(&mut self, from: Option<u32>, to: Option<u32>) -> Result<(u32, u32)> {
        let (from, to) = match (from, to) {
            (Some(f), Some(t)) => (f, t),
            (Some(f), None) => (f, self.store.remote().latest_version()?),
            (None, Some(t)) => (t.saturating_sub(1), t),
            (None, None) => {
                let t = self.store.remote().latest_version()?;
                let f = match marker::read_version(&self.base) {
                    Ok(v) => v,
                    Err(err) => {
                        log::warn!("{err}; assuming previous release {}", t.saturating_sub(1));
                        t.saturating_sub(1)
                    }
                };
                (f, t)
            }
        };
        if from == to {
            Ok((to.saturating_sub(1), to))
        } else {
            Ok((from, to))
        }
    }

    fn run(&mut self, to_version: u32, changes: ChangeSet) -> Result<SyncReport> {
        let deleted = changes
            .values()
            .filter(|c| matches!(c, Change::Delete))
            .count();
        log::info!(
            "syncing to v{to_version}: {} to fetch, {deleted} to delete",
            changes.len() - deleted
        );

        // Structural pass must finish for the whole change-set before any
        // file worker starts.
        self.progress.set_stage("reconciling");
        reconcile::apply(&self.base, &changes)?;

        let files: BTreeMap<String, FileEntry> = changes
            .into_iter()
            .filter_map(|(path, change)| match change {
                Change::Create(entry) | Change::Update(entry) => Some((path, entry)),
                Change::Delete => None,
            })
            .collect();

        self.progress.set_stage("downloading");
        self.progress.start();
        let fetch = fetch::download_files(self.store.remote(), &self.base, &files, &self.progress);
        self.progress.stop();

        if fetch.all_ok() {
            marker::write_version(&self.base, to_version)?;
        } else {
            log::warn!(
                "{} of {} files failed; not recording v{to_version} locally, rerun in resume mode to finish",
                fetch.files_failed,
                files.len()
            );
        }

        Ok(SyncReport {
            to_version,
            changed: files.len(),
            deleted,
            fetch,
        })
    }
}
