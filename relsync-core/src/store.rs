//! Manifest store: fetch, decode, and cache manifests by version.

use std::sync::Arc;

use crate::error::Result;
use crate::manifest::{self, Manifest};
use crate::transport::RemoteSource;

/// Fetches and decodes manifests, retaining the most recently fetched one.
///
/// The cache is not just a performance shortcut: repeated `get` calls for
/// the same version within one run must observe one consistent manifest
/// even if the depot is updated concurrently.
pub struct ManifestStore<R> {
    remote: R,
    cached: Option<Arc<Manifest>>,
}

impl<R: RemoteSource> ManifestStore<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            cached: None,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Manifest for `version`, from cache when it matches.
    pub fn get(&mut self, version: u32) -> Result<Arc<Manifest>> {
        if let Some(cached) = &self.cached {
            if cached.version == version {
                log::debug!("manifest v{version} served from cache");
                return Ok(Arc::clone(cached));
            }
        }
        let token = self.remote.manifest_token(version)?;
        let blob = self.remote.manifest_blob(&token)?;
        let manifest = Arc::new(manifest::decode(version, &blob)?);
        log::info!(
            "fetched manifest v{version}: {} entries ({} compressed bytes)",
            manifest.files.len(),
            blob.len()
        );
        self.cached = Some(Arc::clone(&manifest));
        Ok(manifest)
    }
}
