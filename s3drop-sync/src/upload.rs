//! Single-file upload task: open, derive key, store, log the outcome.

use std::path::Path;

use s3drop_core::{Config, ObjectKey, Outcome};

use crate::error::SyncError;
use crate::retry::RetryPolicy;
use crate::store::{ObjectStore, UploadBody};

/// Per-process settings the upload task needs, extracted from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub bucket: String,
    pub retry: RetryPolicy,
}

impl SyncSettings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            retry: RetryPolicy::none(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            bucket: config.bucket.clone(),
            retry: RetryPolicy::from(config.retry),
        }
    }
}

/// Upload the current contents of `path` under its base name.
///
/// Never fails: every error is logged and folded into [`Outcome::Failure`].
pub async fn upload_file(store: &dyn ObjectStore, settings: &SyncSettings, path: &Path) -> Outcome {
    match try_upload(store, settings, path).await {
        Ok((key, bytes)) => {
            tracing::info!(
                key = %key,
                bucket = %settings.bucket,
                bytes,
                "uploaded file",
            );
            Outcome::Success { key, bytes }
        }
        Err(err) => {
            let key = ObjectKey::from_path(path);
            tracing::error!(
                path = %path.display(),
                key = key.as_ref().map(ObjectKey::as_str),
                error = %err,
                "upload failed",
            );
            Outcome::Failure {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }
}

async fn try_upload(
    store: &dyn ObjectStore,
    settings: &SyncSettings,
    path: &Path,
) -> Result<(ObjectKey, u64), SyncError> {
    let mut attempt = 1u32;
    loop {
        // Reopened per attempt so a retry sends the bytes present at that moment.
        let body = UploadBody::open(path).await?;
        let key = ObjectKey::from_path(path).ok_or_else(|| SyncError::NoObjectKey {
            path: path.to_path_buf(),
        })?;
        let bytes = body.size();

        match store.put(&settings.bucket, &key, body).await {
            Ok(()) => return Ok((key, bytes)),
            Err(err) if settings.retry.should_retry(attempt, &err) => {
                let delay = settings.retry.backoff_for(attempt);
                tracing::warn!(
                    key = %key,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient store failure, retrying",
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(SyncError::Store {
                    key: key.to_string(),
                    source: err,
                })
            }
        }
    }
}
