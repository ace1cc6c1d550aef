//! Cache-aside read path: cache lookup, origin fetch, best-effort population.

use std::{sync::Arc, time::Duration};

use axum::http::StatusCode;
use bytes::Bytes;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, warn};

use crate::{
    cache::{CachedEnvelope, KvCache, LookupKey},
    origin::{FetchedObject, OriginError},
};

use super::{
    context::{AppContext, FallbackPage},
    error::HttpError,
    route::{RequestError, RouteConfig},
};

const METRIC_CACHE_HIT_TOTAL: &str = "bucketfront_cache_hit_total";
const METRIC_CACHE_MISS_TOTAL: &str = "bucketfront_cache_miss_total";
const METRIC_CACHE_CORRUPT_TOTAL: &str = "bucketfront_cache_corrupt_total";
const METRIC_CACHE_ERROR_TOTAL: &str = "bucketfront_cache_error_total";
const METRIC_CACHE_STORE_TOTAL: &str = "bucketfront_cache_store_total";
const METRIC_CACHE_SKIP_OVERSIZE_TOTAL: &str = "bucketfront_cache_skip_oversize_total";
const METRIC_ORIGIN_ERROR_TOTAL: &str = "bucketfront_origin_error_total";

const SOURCE: &str = "application::orchestrator";

/// Where a served body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Hit,
    Miss,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Hit => "HIT",
            Provenance::Miss => "MISS",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServedObject {
    pub provenance: Provenance,
    pub content_type: String,
    pub etag: String,
    pub last_modified: OffsetDateTime,
    pub content: Bytes,
}

impl ServedObject {
    fn from_envelope(envelope: CachedEnvelope) -> Self {
        let (content_type, etag, last_modified, content) = envelope.into_parts();
        Self {
            provenance: Provenance::Hit,
            content_type,
            etag,
            last_modified,
            content,
        }
    }

    fn from_origin(fetched: FetchedObject) -> Self {
        Self {
            provenance: Provenance::Miss,
            content_type: fetched.meta.content_type,
            etag: fetched.meta.etag,
            last_modified: fetched.meta.last_modified,
            content: fetched.content,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Served(ServedObject),
    /// The object does not exist; carries the fallback page when one is readable.
    NotFound(Option<FallbackPage>),
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
    #[error(transparent)]
    Origin(OriginError),
}

impl From<ServeError> for HttpError {
    fn from(error: ServeError) -> Self {
        match error {
            ServeError::InvalidRequest(err) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Bad Request",
                &err,
            ),
            ServeError::Origin(err) => HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
                &err,
            ),
        }
    }
}

/// Cache-aside pipeline bound to one route.
#[derive(Clone)]
pub struct CacheAsideService {
    context: Arc<AppContext>,
    route: Arc<RouteConfig>,
}

impl CacheAsideService {
    pub fn new(context: Arc<AppContext>, route: Arc<RouteConfig>) -> Self {
        Self { context, route }
    }

    pub fn route(&self) -> &RouteConfig {
        &self.route
    }

    /// Serve the object behind `request_path` (raw, percent-encoded).
    pub async fn handle(&self, request_path: &str) -> Result<Outcome, ServeError> {
        let object_key = self.route.resolve_object_key(request_path).map_err(|err| {
            debug!(path = request_path, error = %err, "rejected request path");
            err
        })?;
        let bucket = self.route.bucket.as_str();
        let lookup_key = LookupKey::new(bucket, &object_key);

        let cache = self.active_cache();

        if let Some((cache, _)) = cache
            && let Some(envelope) = self.lookup(cache.as_ref(), &lookup_key).await
        {
            return Ok(Outcome::Served(ServedObject::from_envelope(envelope)));
        }

        debug!(bucket, object_key = %object_key, "cache miss, fetching from origin");

        let fetched = match self.context.origin().fetch(bucket, &object_key).await {
            Ok(fetched) => fetched,
            Err(OriginError::NotFound) => {
                debug!(bucket, object_key = %object_key, "object not found in bucket");
                return Ok(Outcome::NotFound(self.context.load_fallback().await));
            }
            Err(err) => {
                record_origin_error(&err, bucket, &object_key);
                return Err(ServeError::Origin(err));
            }
        };

        if let Some((cache, ttl)) = cache {
            self.populate(cache.as_ref(), &lookup_key, &fetched, ttl).await;
        }

        Ok(Outcome::Served(ServedObject::from_origin(fetched)))
    }

    fn active_cache(&self) -> Option<(&Arc<dyn KvCache>, Duration)> {
        let ttl = self.route.cache_ttl?;
        self.context.cache().map(|cache| (cache, ttl))
    }

    async fn lookup(&self, cache: &dyn KvCache, key: &LookupKey) -> Option<CachedEnvelope> {
        match cache.get(key.as_str()).await {
            Ok(Some(raw)) => match CachedEnvelope::decode(&raw) {
                Ok(envelope) => {
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    debug!(cache_key = %key, "cache hit");
                    Some(envelope)
                }
                Err(err) => {
                    counter!(METRIC_CACHE_CORRUPT_TOTAL).increment(1);
                    warn!(cache_key = %key, error = %err, "failed to decode cached object");
                    None
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
                None
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "get").increment(1);
                error!(cache_key = %key, error = %err, "cache GET error");
                None
            }
        }
    }

    async fn populate(
        &self,
        cache: &dyn KvCache,
        key: &LookupKey,
        fetched: &FetchedObject,
        ttl: Duration,
    ) {
        let limit = self.context.max_cache_size();
        if fetched.meta.size > limit {
            counter!(METRIC_CACHE_SKIP_OVERSIZE_TOTAL).increment(1);
            debug!(
                cache_key = %key,
                size = fetched.meta.size,
                max_cache_size = limit,
                "object exceeds max_cache_size; not caching"
            );
            return;
        }

        let envelope = CachedEnvelope::new(
            fetched.meta.content_type.clone(),
            fetched.meta.etag.clone(),
            fetched.meta.last_modified,
            fetched.content.clone(),
        );
        let encoded = match envelope.encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(cache_key = %key, error = %err, "failed to encode object for caching");
                return;
            }
        };

        match cache.set(key.as_str(), Bytes::from(encoded), ttl).await {
            Ok(()) => {
                counter!(METRIC_CACHE_STORE_TOTAL).increment(1);
                debug!(cache_key = %key, ttl = ?ttl, "stored object in cache");
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR_TOTAL, "op" => "set").increment(1);
                error!(cache_key = %key, error = %err, "failed to SET object in cache");
            }
        }
    }
}

fn record_origin_error(err: &OriginError, bucket: &str, object_key: &str) {
    match err {
        OriginError::Backend { code, .. } => {
            counter!(METRIC_ORIGIN_ERROR_TOTAL, "kind" => "backend").increment(1);
            error!(
                error_code = %code,
                bucket,
                key = object_key,
                error = %err,
                "origin returned an error"
            );
        }
        OriginError::ReadFailure(inner) => {
            counter!(METRIC_ORIGIN_ERROR_TOTAL, "kind" => "read").increment(1);
            error!(
                bucket,
                key = object_key,
                error = %inner,
                "failed to read object content from origin"
            );
        }
        OriginError::NotFound => {}
    }
}
