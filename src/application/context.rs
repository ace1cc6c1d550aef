//! Process-wide handles shared by every route.

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use tracing::{info, warn};

use crate::{
    cache::KvCache,
    config::Settings,
    infra::error::InfraError,
    origin::{BlobStore, DEFAULT_CONTENT_TYPE, OriginGateway},
};

/// Settings the context needs beyond the client handles.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub default_ttl: Option<String>,
    pub max_cache_size: u64,
    pub not_found_file: Option<PathBuf>,
}

impl From<&Settings> for ContextOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            default_ttl: settings.cache.default_ttl.clone(),
            max_cache_size: settings.cache.max_cache_size.get(),
            not_found_file: settings.not_found_file.clone(),
        }
    }
}

/// Page served in place of a missing object.
#[derive(Debug, Clone)]
pub struct FallbackPage {
    pub content_type: String,
    pub content: Bytes,
}

pub struct AppContext {
    cache: Option<Arc<dyn KvCache>>,
    origin: OriginGateway,
    options: ContextOptions,
    closed: AtomicBool,
}

impl AppContext {
    /// Build the context, verifying the cache answers a ping when one is configured.
    pub async fn provision(
        store: Arc<dyn BlobStore>,
        cache: Option<Arc<dyn KvCache>>,
        options: ContextOptions,
    ) -> Result<Self, InfraError> {
        if let Some(cache) = cache.as_ref() {
            cache.ping().await.map_err(|err| {
                InfraError::configuration(format!("cache did not answer ping: {err}"))
            })?;
        }

        info!(
            caching_configured = cache.is_some(),
            max_cache_size = options.max_cache_size,
            not_found_file = ?options.not_found_file,
            "provisioned application context"
        );

        Ok(Self {
            cache,
            origin: OriginGateway::new(store),
            options,
            closed: AtomicBool::new(false),
        })
    }

    pub fn cache(&self) -> Option<&Arc<dyn KvCache>> {
        self.cache.as_ref()
    }

    pub fn origin(&self) -> &OriginGateway {
        &self.origin
    }

    pub fn default_ttl(&self) -> Option<&str> {
        self.options.default_ttl.as_deref()
    }

    pub fn max_cache_size(&self) -> u64 {
        self.options.max_cache_size
    }

    /// Read the configured not-found page. `None` when unset or unreadable.
    pub async fn load_fallback(&self) -> Option<FallbackPage> {
        let path = self.options.not_found_file.as_ref()?;
        match tokio::fs::read(path).await {
            Ok(content) => {
                let content_type = mime_guess::from_path(path)
                    .first_raw()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                Some(FallbackPage {
                    content_type,
                    content: Bytes::from(content),
                })
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "not_found_file is unreadable; serving plain 404"
                );
                None
            }
        }
    }

    /// Release the cache client. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(cache) = self.cache.as_ref() {
            cache.close().await;
        }
        info!("application context closed");
    }
}
