//! Error types for relsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from synchronization operations.
///
/// Manifest-level `Retrieval`/`Format` failures abort the whole operation;
/// no change-set can be trusted without a valid manifest. `LocalState` is
/// recoverable during version resolution. Per-file download failures never
/// surface here at all — they are contained and reported by the fetcher.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A named remote resource could not be fetched.
    #[error("failed to retrieve {resource}: {reason}")]
    Retrieval { resource: String, reason: String },

    /// A manifest body could not be decompressed or decoded.
    #[error("manifest for version {version} is malformed: {reason}")]
    Format { version: u32, reason: String },

    /// The local version marker is missing or corrupt.
    #[error("local version marker {path}: {reason}")]
    LocalState { path: PathBuf, reason: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub(crate) fn retrieval(resource: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::Retrieval {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn format(version: u32, reason: impl ToString) -> Self {
        SyncError::Format {
            version,
            reason: reason.to_string(),
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
