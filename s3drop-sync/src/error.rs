//! Error types for s3drop-sync.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Timeouts, dropped connections, throttling, 5xx responses.
    #[error("transient store error: {0}")]
    Transient(String),

    /// Rejected requests: missing bucket, access denied, malformed input.
    #[error("store error: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// All errors that can end a single upload task.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The file could not be opened or inspected.
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path exists but is a directory or special file.
    #[error("{path} is not a regular file")]
    NotAFile { path: PathBuf },

    /// No object key can be derived from the path.
    #[error("cannot derive an object key from {path}")]
    NoObjectKey { path: PathBuf },

    /// The remote store rejected or failed the transfer.
    #[error("failed to upload {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
