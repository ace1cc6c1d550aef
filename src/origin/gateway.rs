use std::{sync::Arc, time::Instant};

use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use metrics::histogram;
use tracing::warn;

use super::{BlobStore, ObjectMeta, OriginError};

const METRIC_ORIGIN_FETCH_MS: &str = "bucketfront_origin_fetch_ms";

/// One object read in full from the origin.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    /// `meta.size` is the number of bytes actually read.
    pub meta: ObjectMeta,
    pub content: Bytes,
}

/// Reads whole objects from the blob store and normalizes the outcome.
#[derive(Clone)]
pub struct OriginGateway {
    store: Arc<dyn BlobStore>,
}

impl OriginGateway {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, OriginError> {
        let started_at = Instant::now();
        let result = self.fetch_inner(bucket, key).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(OriginError::NotFound) => "not_found",
            Err(_) => "error",
        };
        histogram!(METRIC_ORIGIN_FETCH_MS, "outcome" => outcome)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        result
    }

    async fn fetch_inner(&self, bucket: &str, key: &str) -> Result<FetchedObject, OriginError> {
        let mut meta = self.store.stat(bucket, key).await?;
        let mut stream = self.store.get(bucket, key).await?;

        let capacity = usize::try_from(meta.size).unwrap_or(0);
        let mut buffer = BytesMut::with_capacity(capacity);
        while let Some(chunk) = stream.try_next().await.map_err(OriginError::ReadFailure)? {
            buffer.extend_from_slice(&chunk);
        }

        let read = buffer.len() as u64;
        if read != meta.size {
            warn!(
                bucket,
                key,
                reported = meta.size,
                read,
                "origin object size differs from stat"
            );
            meta.size = read;
        }

        Ok(FetchedObject {
            meta,
            content: buffer.freeze(),
        })
    }
}
