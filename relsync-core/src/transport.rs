//! Remote depot access.
//!
//! `RemoteSource` is the seam between the engine and the network: the
//! store and the fetcher only ever talk to this trait, so tests drive the
//! whole pipeline from in-memory sources. `HttpSource` is the production
//! implementation over blocking HTTP.

use std::io::Read;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Upper bound on any single response body; a depot answer larger than
/// this is treated as a transport fault rather than buffered.
const MAX_BODY: u64 = 1 << 30;

/// Blocking access to the remote release depot.
pub trait RemoteSource: Send + Sync {
    /// Latest published version per the depot's version listing.
    fn latest_version(&self) -> Result<u32>;
    /// Small text token locating the manifest blob for `version`.
    fn manifest_token(&self, version: u32) -> Result<String>;
    /// Deflate-compressed manifest body addressed by `token`.
    fn manifest_blob(&self, token: &str) -> Result<Vec<u8>>;
    /// Deflate-compressed bytes of one content part.
    fn part(&self, id: &str) -> Result<Vec<u8>>;
}

/// Decompress a deflate(zlib) payload.
pub fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// [`RemoteSource`] over HTTP, addressed by depot base URL and game id.
pub struct HttpSource {
    agent: ureq::Agent,
    base_url: String,
    game_id: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, game_id: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(15))
            .timeout_read(Duration::from_secs(120))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            game_id: game_id.into(),
        }
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.game_id, tail)
    }

    fn get_text(&self, tail: &str, resource: &str) -> Result<String> {
        let url = self.url(tail);
        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| SyncError::retrieval(resource, e))?;
        resp.into_string()
            .map_err(|e| SyncError::retrieval(resource, e))
    }

    fn get_bytes(&self, tail: &str, resource: &str) -> Result<Vec<u8>> {
        let url = self.url(tail);
        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| SyncError::retrieval(resource, e))?;
        let mut buf = Vec::new();
        resp.into_reader()
            .take(MAX_BODY)
            .read_to_end(&mut buf)
            .map_err(|e| SyncError::retrieval(resource, e))?;
        Ok(buf)
    }
}

impl RemoteSource for HttpSource {
    fn latest_version(&self) -> Result<u32> {
        let body = self.get_text("latest.txt", "version listing")?;
        body.trim().parse().map_err(|_| {
            SyncError::retrieval("version listing", format!("not a version number: {body:?}"))
        })
    }

    fn manifest_token(&self, version: u32) -> Result<String> {
        let resource = format!("manifest token for version {version}");
        let body = self.get_text(&format!("{version}/manifest.txt"), &resource)?;
        Ok(body.trim().to_string())
    }

    fn manifest_blob(&self, token: &str) -> Result<Vec<u8>> {
        let resource = format!("manifest blob {token}");
        self.get_bytes(&format!("blobs/{token}"), &resource)
    }

    fn part(&self, id: &str) -> Result<Vec<u8>> {
        let resource = format!("part {id}");
        self.get_bytes(&format!("parts/{id}"), &resource)
    }
}
