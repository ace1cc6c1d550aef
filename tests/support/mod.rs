#![allow(dead_code)]

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response},
};
use bucketfront::{
    application::{
        context::{AppContext, ContextOptions},
        orchestrator::CacheAsideService,
        route::RouteConfig,
    },
    cache::{CacheError, KvCache},
    config::RouteSettings,
    infra::http::build_router,
    origin::{BlobStore, ObjectMeta, ObjectStream, OriginError},
};
use bytes::Bytes;
use futures::{StreamExt, stream};
use http_body_util::BodyExt;
use time::{OffsetDateTime, macros::datetime};
use tokio::sync::Mutex;
use tower::ServiceExt;

pub const LAST_MODIFIED: OffsetDateTime = datetime!(2024-01-01 00:00:00 UTC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginFailure {
    Backend,
    BrokenStream,
}

#[derive(Default)]
pub struct FakeBlobStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
    failure: Mutex<Option<OriginFailure>>,
    stall: Mutex<Option<Duration>>,
    pub stat_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

impl FakeBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put(&self, bucket: &str, key: &str, content: impl Into<Bytes>) {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), content.into());
    }

    pub async fn fail_with(&self, failure: OriginFailure) {
        *self.failure.lock().await = Some(failure);
    }

    /// Delay every content read by `delay`.
    pub async fn stall_reads(&self, delay: Duration) {
        *self.stall.lock().await = Some(delay);
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.stat_calls.load(Ordering::SeqCst),
            self.get_calls.load(Ordering::SeqCst),
        )
    }

    async fn lookup(&self, bucket: &str, key: &str) -> Result<Bytes, OriginError> {
        if *self.failure.lock().await == Some(OriginFailure::Backend) {
            return Err(OriginError::backend(
                "AccessDenied",
                bucket,
                key,
                "access denied",
            ));
        }
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or(OriginError::NotFound)
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn stat(&self, bucket: &str, key: &str) -> Result<ObjectMeta, OriginError> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        let content = self.lookup(bucket, key).await?;
        Ok(ObjectMeta {
            content_type: "text/html".to_string(),
            etag: "\"abc123\"".to_string(),
            last_modified: LAST_MODIFIED,
            size: content.len() as u64,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<ObjectStream, OriginError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let stall = *self.stall.lock().await;
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        let content = self.lookup(bucket, key).await?;
        if *self.failure.lock().await == Some(OriginFailure::BrokenStream) {
            let chunks = vec![
                Ok(content.slice(..content.len() / 2)),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            ];
            return Ok(stream::iter(chunks).boxed());
        }
        Ok(stream::iter(vec![Ok(content)]).boxed())
    }
}

#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, (Bytes, Duration)>>,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
    pub fail_ping: AtomicBool,
    pub get_calls: AtomicUsize,
    pub set_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl FakeCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert_raw(&self, key: &str, value: impl Into<Bytes>) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.into(), Duration::from_secs(60)));
    }

    pub async fn entry(&self, key: &str) -> Option<(Bytes, Duration)> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl KvCache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CacheError::backend("connection refused"));
        }
        Ok(self.entries.lock().await.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(CacheError::backend("OOM command not allowed"));
        }
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value, ttl));
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(CacheError::unreachable("connection refused"));
        }
        Ok(())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn route(bucket: &str) -> RouteSettings {
    RouteSettings {
        mount: "/".to_string(),
        bucket: bucket.to_string(),
        ..Default::default()
    }
}

pub fn options(default_ttl: Option<&str>) -> ContextOptions {
    ContextOptions {
        default_ttl: default_ttl.map(str::to_string),
        max_cache_size: 10 * 1024 * 1024,
        not_found_file: None,
    }
}

pub struct Harness {
    pub router: Router,
    pub context: Arc<AppContext>,
}

pub async fn harness(
    store: Arc<FakeBlobStore>,
    cache: Option<Arc<FakeCache>>,
    routes: Vec<RouteSettings>,
    options: ContextOptions,
) -> Harness {
    harness_with_timeout(store, cache, routes, options, Duration::from_secs(5)).await
}

pub async fn harness_with_timeout(
    store: Arc<FakeBlobStore>,
    cache: Option<Arc<FakeCache>>,
    routes: Vec<RouteSettings>,
    options: ContextOptions,
    request_timeout: Duration,
) -> Harness {
    let cache = cache.map(|cache| cache as Arc<dyn KvCache>);
    let context = Arc::new(
        AppContext::provision(store, cache, options)
            .await
            .expect("context should provision"),
    );

    let services = routes
        .iter()
        .map(|settings| {
            let route = RouteConfig::provision(settings, &context).expect("route should provision");
            CacheAsideService::new(Arc::clone(&context), Arc::new(route))
        })
        .collect();

    Harness {
        router: build_router(services, request_timeout),
        context,
    }
}

impl Harness {
    pub async fn send(&self, method: Method, uri: &str, headers: &[(&str, &str)]) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).expect("request should build");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Method::GET, uri, &[]).await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
}
