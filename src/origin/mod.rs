//! Origin object storage: the blob store capability and the gateway over it.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;
use time::OffsetDateTime;

mod gateway;
mod s3;

pub use gateway::{FetchedObject, OriginGateway};
pub use s3::S3BlobStore;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata reported by the blob store for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: String,
    /// Entity tag exactly as the store reports it, quotes included.
    pub etag: String,
    /// `UNIX_EPOCH` when the store did not report a modification time.
    pub last_modified: OffsetDateTime,
    pub size: u64,
}

pub type ObjectStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum OriginError {
    #[error("object does not exist")]
    NotFound,
    #[error("origin request for `{bucket}/{key}` failed ({code}): {message}")]
    Backend {
        code: String,
        bucket: String,
        key: String,
        message: String,
    },
    #[error("failed to read object body: {0}")]
    ReadFailure(#[source] io::Error),
}

impl OriginError {
    pub fn backend(
        code: impl Into<String>,
        bucket: &str,
        key: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            code: code.into(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// S3-compatible object storage, reduced to the two calls the gateway needs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectMeta, OriginError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectStream, OriginError>;
}
