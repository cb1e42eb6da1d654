//! Local version marker: one little-endian u32 in `version.dat` at the
//! installation root, recording the last fully-synced release.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::{io_err, Result, SyncError};

pub const MARKER_FILE: &str = "version.dat";

/// Read the locally recorded version.
pub fn read_version(base: &Path) -> Result<u32> {
    let path = base.join(MARKER_FILE);
    let mut f = std::fs::File::open(&path).map_err(|e| SyncError::LocalState {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    let mut buf = [0u8; 4];
    f.read_exact(&mut buf).map_err(|_| SyncError::LocalState {
        path: path.clone(),
        reason: "shorter than 4 bytes".to_string(),
    })?;
    Ok(u32::from_le_bytes(buf))
}

/// Record `version` as the installed release.
pub fn write_version(base: &Path, version: u32) -> Result<()> {
    let path = base.join(MARKER_FILE);
    let mut f = std::fs::File::create(&path).map_err(|e| io_err(&path, e))?;
    f.write_all(&version.to_le_bytes())
        .map_err(|e| io_err(&path, e))
}
