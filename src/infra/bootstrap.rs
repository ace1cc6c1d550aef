//! Wiring from validated settings to live clients.

use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::{
    application::{
        context::{AppContext, ContextOptions},
        route::RouteConfig,
    },
    cache::{KvCache, RedisCache},
    config::Settings,
    origin::{BlobStore, S3BlobStore},
};

use super::error::InfraError;

/// Build the shared context: origin client, optional cache client, verified with a ping.
pub async fn build_context(settings: &Settings) -> Result<Arc<AppContext>, InfraError> {
    let store: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(&settings.origin));
    info!(
        endpoint = %settings.origin.endpoint_url(),
        region = %settings.origin.region,
        "configured origin client"
    );

    let cache: Option<Arc<dyn KvCache>> = match settings.cache.url.as_deref() {
        Some(url) => {
            let client = RedisCache::connect(url).await?;
            info!(url = %redact_url(url), "connected cache client");
            Some(Arc::new(client))
        }
        None => {
            info!("cache.url not set; caching disabled");
            None
        }
    };

    let context =
        AppContext::provision(store, cache, ContextOptions::from(settings)).await?;
    Ok(Arc::new(context))
}

/// Resolve every configured route against the context.
pub fn build_routes(
    settings: &Settings,
    context: &AppContext,
) -> Result<Vec<RouteConfig>, InfraError> {
    settings
        .routes
        .iter()
        .map(|route| RouteConfig::provision(route, context))
        .collect()
}

fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable>".to_string(),
    }
}
