use std::path::PathBuf;

use thiserror::Error;

/// Setup errors for the watcher runtime. All of them are fatal.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config error: {0}")]
    Config(#[from] s3drop_core::ConfigError),

    #[error("watch directory does not exist: {path}")]
    WatchDirMissing { path: PathBuf },

    #[error("watch path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("bucket '{bucket}' is not reachable: {source}")]
    BucketCheck {
        bucket: String,
        #[source]
        source: s3drop_sync::StoreError,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
