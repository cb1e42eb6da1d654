//! Manifest data model and wire decoding.
//!
//! A manifest is the authoritative description of one release: every file
//! and directory in the installation, its recorded mtime and final size,
//! and the ordered content parts that reassemble it. On the wire the body
//! is deflate-compressed JSON whose `files` keys are obfuscated: base64 of
//! the path text encoded per `filepath_encoding`, with backslash
//! separators. Decoding rewrites every key into a canonical
//! forward-relative path in a fresh map.

use std::collections::BTreeMap;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::transport;

/// Reserved part identifier marking a directory entry on the wire.
pub const DIR_SENTINEL: &str = "__DIR__";

/// Versioned snapshot descriptor for one release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub version: u32,
    /// Normalized relative path -> entry. `BTreeMap` keeps diff output and
    /// logs deterministic.
    pub files: BTreeMap<String, FileEntry>,
}

/// One file or directory in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Last-modified time recorded at manifest-build time, epoch seconds.
    pub mtime: i64,
    /// Final (decompressed, reassembled) byte length; 0 for directories.
    pub fsize: u64,
    pub content: EntryContent,
}

/// Tagged payload of a [`FileEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryContent {
    Directory,
    File {
        /// Opaque part identifiers, in reassembly order.
        parts: Vec<String>,
        /// Expected decompressed length of each part, same order.
        part_sizes: Vec<u64>,
    },
}

impl FileEntry {
    pub fn is_directory(&self) -> bool {
        matches!(self.content, EntryContent::Directory)
    }
}

#[derive(Deserialize)]
struct RawManifest {
    files: BTreeMap<String, RawEntry>,
    filepath_encoding: String,
}

#[derive(Deserialize)]
struct RawEntry {
    mtime: i64,
    fsize: u64,
    objects: Vec<String>,
    #[serde(default)]
    objects_fsize: Vec<u64>,
}

/// Decompress and decode a manifest body fetched for `version`.
pub fn decode(version: u32, blob: &[u8]) -> Result<Manifest> {
    let json = transport::inflate(blob)
        .map_err(|e| SyncError::format(version, format!("inflate failed: {e}")))?;
    let raw: RawManifest = serde_json::from_slice(&json)
        .map_err(|e| SyncError::format(version, format!("bad manifest JSON: {e}")))?;

    let encoding = encoding_rs::Encoding::for_label(raw.filepath_encoding.as_bytes())
        .ok_or_else(|| {
            SyncError::format(
                version,
                format!("unknown filepath_encoding {:?}", raw.filepath_encoding),
            )
        })?;

    // Build a fresh map of decoded keys; the raw map is consumed, never
    // rewritten in place.
    let mut files = BTreeMap::new();
    for (raw_key, raw_entry) in raw.files {
        let path = decode_key(version, &raw_key, encoding)?;
        let entry = convert_entry(version, &path, raw_entry)?;
        if files.insert(path.clone(), entry).is_some() {
            return Err(SyncError::format(
                version,
                format!("duplicate path after normalization: {path:?}"),
            ));
        }
    }
    Ok(Manifest { version, files })
}

fn decode_key(version: u32, raw_key: &str, encoding: &'static encoding_rs::Encoding) -> Result<String> {
    let bytes = BASE64_STANDARD
        .decode(raw_key)
        .map_err(|e| SyncError::format(version, format!("path key is not base64: {e}")))?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        return Err(SyncError::format(
            version,
            format!("path key {raw_key:?} is not valid {}", encoding.name()),
        ));
    }
    normalize_path(&text)
        .ok_or_else(|| SyncError::format(version, format!("unsafe path in manifest: {text:?}")))
}

/// Canonicalize a decoded path: backslashes become forward slashes, empty
/// and `.` segments drop out. Absolute paths, drive prefixes and parent
/// traversal are rejected (`None`).
fn normalize_path(decoded: &str) -> Option<String> {
    let slashed = decoded.replace('\\', "/");
    if slashed.starts_with('/') {
        return None;
    }
    let mut segments = Vec::new();
    for seg in slashed.split('/') {
        match seg {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(':') => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

fn convert_entry(version: u32, path: &str, raw: RawEntry) -> Result<FileEntry> {
    let content = if raw.objects.len() == 1 && raw.objects[0] == DIR_SENTINEL {
        EntryContent::Directory
    } else {
        if raw.objects.len() != raw.objects_fsize.len() {
            return Err(SyncError::format(
                version,
                format!(
                    "{path:?} lists {} parts but {} part sizes",
                    raw.objects.len(),
                    raw.objects_fsize.len()
                ),
            ));
        }
        EntryContent::File {
            parts: raw.objects,
            part_sizes: raw.objects_fsize,
        }
    };
    Ok(FileEntry {
        mtime: raw.mtime,
        fsize: raw.fsize,
        content,
    })
}
