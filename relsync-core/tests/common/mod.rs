//! Shared fixtures: an in-memory `RemoteSource` and raw-manifest builders.
#![allow(dead_code)] // each test binary uses a subset

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::{json, Value};

use relsync_core::error::Result;
use relsync_core::transport::RemoteSource;
use relsync_core::SyncError;

/// Deflate(zlib)-compress a payload the way the depot serves them.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Obfuscated wire key for a forward-slash path (utf-8 encoding).
pub fn wire_key(path: &str) -> String {
    BASE64_STANDARD.encode(path.replace('/', "\\").as_bytes())
}

pub fn file_entry(mtime: i64, parts: &[(&str, u64)]) -> Value {
    let fsize: u64 = parts.iter().map(|(_, n)| n).sum();
    json!({
        "mtime": mtime,
        "fsize": fsize,
        "objects": parts.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        "objects_fsize": parts.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
    })
}

pub fn dir_entry(mtime: i64) -> Value {
    json!({ "mtime": mtime, "fsize": 0, "objects": ["__DIR__"] })
}

/// Raw manifest JSON from (path, entry) pairs; keys are wire-obfuscated.
pub fn manifest_json(entries: &[(&str, Value)]) -> Value {
    let files: serde_json::Map<String, Value> = entries
        .iter()
        .map(|(path, entry)| (wire_key(path), entry.clone()))
        .collect();
    json!({ "filepath_encoding": "utf-8", "files": files })
}

/// In-memory depot. Clones share state, so tests can keep a handle while
/// the syncer owns another.
#[derive(Clone, Default)]
pub struct MemSource {
    pub latest: u32,
    manifests: Arc<Mutex<HashMap<u32, Vec<u8>>>>,
    parts: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    pub manifest_fetches: Arc<AtomicUsize>,
    pub part_fetches: Arc<AtomicUsize>,
}

impl MemSource {
    pub fn add_manifest(&self, version: u32, body: &Value) {
        let blob = deflate(body.to_string().as_bytes());
        self.manifests.lock().unwrap().insert(version, blob);
    }

    pub fn add_manifest_blob(&self, version: u32, blob: Vec<u8>) {
        self.manifests.lock().unwrap().insert(version, blob);
    }

    pub fn add_part(&self, id: &str, plain: &[u8]) {
        self.parts.lock().unwrap().insert(id.to_string(), deflate(plain));
    }

    pub fn add_raw_part(&self, id: &str, raw: Vec<u8>) {
        self.parts.lock().unwrap().insert(id.to_string(), raw);
    }
}

impl RemoteSource for MemSource {
    fn latest_version(&self) -> Result<u32> {
        Ok(self.latest)
    }

    fn manifest_token(&self, version: u32) -> Result<String> {
        if self.manifests.lock().unwrap().contains_key(&version) {
            Ok(format!("tok-{version}"))
        } else {
            Err(SyncError::Retrieval {
                resource: format!("manifest token for version {version}"),
                reason: "no such version".to_string(),
            })
        }
    }

    fn manifest_blob(&self, token: &str) -> Result<Vec<u8>> {
        self.manifest_fetches.fetch_add(1, Ordering::Relaxed);
        let version: u32 = token
            .strip_prefix("tok-")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        self.manifests
            .lock()
            .unwrap()
            .get(&version)
            .cloned()
            .ok_or_else(|| SyncError::Retrieval {
                resource: format!("manifest blob {token}"),
                reason: "unknown token".to_string(),
            })
    }

    fn part(&self, id: &str) -> Result<Vec<u8>> {
        self.part_fetches.fetch_add(1, Ordering::Relaxed);
        self.parts
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::Retrieval {
                resource: format!("part {id}"),
                reason: "no such part".to_string(),
            })
    }
}
