//! Remote store capability consumed by the pipeline.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use s3drop_core::ObjectKey;

use crate::error::{io_err, StoreError, SyncError};

/// An open file handed to a store as a streaming request body.
///
/// The handle is owned by the body, so it is closed when the store drops it,
/// whether the transfer succeeded or not.
#[derive(Debug)]
pub struct UploadBody {
    file: File,
    len: u64,
}

impl UploadBody {
    /// Open `path` for reading. Fails for missing paths and non-regular files.
    pub async fn open(path: &Path) -> Result<Self, SyncError> {
        let file = File::open(path).await.map_err(|e| io_err(path, e))?;
        let metadata = file.metadata().await.map_err(|e| io_err(path, e))?;
        if !metadata.is_file() {
            return Err(SyncError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            file,
            len: metadata.len(),
        })
    }

    /// Size of the file when it was opened.
    pub fn size(&self) -> u64 {
        self.len
    }

    pub fn into_file(self) -> File {
        self.file
    }

    /// Drain the body into memory. For stores that cannot stream.
    pub async fn read_to_end(mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len as usize);
        self.file.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

/// A bucket/key object store with a single overwrite-on-put operation.
///
/// Implementations must be safe for sequential reuse; the pipeline never
/// calls `put` concurrently.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` at `bucket`/`key`, replacing any existing object.
    async fn put(&self, bucket: &str, key: &ObjectKey, body: UploadBody) -> Result<(), StoreError>;
}
