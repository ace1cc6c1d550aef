use std::io;

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use futures::{StreamExt, stream};
use time::OffsetDateTime;
use tracing::debug;

use crate::config::OriginSettings;

use super::{BlobStore, DEFAULT_CONTENT_TYPE, ObjectMeta, ObjectStream, OriginError};

const CREDENTIALS_PROVIDER: &str = "bucketfront-static";

/// Blob store backed by an S3-compatible endpoint (MinIO, Ceph, AWS).
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    pub fn new(settings: &OriginSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        // Self-hosted endpoints need path-style addressing (endpoint/bucket/key).
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectMeta, OriginError> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, bucket, key))?;

        let last_modified = output
            .last_modified()
            .and_then(|value| OffsetDateTime::from_unix_timestamp(value.secs()).ok())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        Ok(ObjectMeta {
            content_type: output
                .content_type()
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            etag: output.e_tag().unwrap_or_default().to_string(),
            last_modified,
            size: output
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectStream, OriginError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(err, bucket, key))?;

        let body = stream::try_unfold(output.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Ok(Some((chunk, body))),
                Ok(None) => Ok(None),
                Err(err) => Err(io::Error::other(err)),
            }
        });

        Ok(body.boxed())
    }
}

fn classify<E>(err: SdkError<E>, bucket: &str, key: &str) -> OriginError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let code = err
        .as_service_error()
        .and_then(|service| service.code())
        .map(str::to_string);

    match (code.as_deref(), status) {
        (Some("NoSuchKey" | "NotFound"), _) | (None, Some(404)) => {
            debug!(bucket, key, "origin object not found");
            OriginError::NotFound
        }
        _ => {
            let code = code
                .or_else(|| status.map(|status| format!("HTTP {status}")))
                .unwrap_or_else(|| "Unknown".to_string());
            OriginError::backend(code, bucket, key, DisplayErrorContext(&err).to_string())
        }
    }
}
