//! S3 (and S3-compatible) implementation of [`ObjectStore`].

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use aws_smithy_types::byte_stream::Length;

use s3drop_core::{Config, ObjectKey};

use crate::error::StoreError;
use crate::store::{ObjectStore, UploadBody};

/// Object store backed by `aws-sdk-s3`.
///
/// Credentials come from the default AWS provider chain (environment,
/// profile, IMDS); region and endpoint come from [`Config`].
#[derive(Debug, Clone)]
pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    /// Build a client for `config.region` and optional `config.endpoint_url`.
    ///
    /// No request is sent; credentials are resolved lazily on first use.
    pub async fn connect(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
        }
    }

    /// Confirm the bucket exists and is reachable with the current credentials.
    pub async fn check_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, bucket: &str, key: &ObjectKey, body: UploadBody) -> Result<(), StoreError> {
        let (stream, len) = request_body(body).await?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key.as_str())
            .content_length(len as i64)
            .body(stream)
            .send()
            .await
            .map_err(classify)?;

        Ok(())
    }
}

/// Stream exactly the bytes counted when the body was opened, so the
/// `Content-Length` header and the body agree while a writer is still appending.
async fn request_body(body: UploadBody) -> Result<(ByteStream, u64), StoreError> {
    let len = body.size();
    let stream = ByteStream::read_from()
        .file(body.into_file())
        .length(Length::Exact(len))
        .build()
        .await
        .map_err(|e| StoreError::Permanent(format!("cannot stream file body: {e}")))?;
    Ok((stream, len))
}

/// Map an SDK failure onto the transient/permanent split used for retry.
fn classify<E>(err: SdkError<E>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status == 429 || status >= 500
        }
        _ => false,
    };

    let message = DisplayErrorContext(&err).to_string();
    if transient {
        StoreError::Transient(message)
    } else {
        StoreError::Permanent(message)
    }
}
