//! Per-route configuration resolved once at startup.

use std::time::Duration;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::info;

use crate::{cache::resolve_ttl, config::RouteSettings, infra::error::InfraError};

use super::context::AppContext;

const INDEX_DOCUMENT: &str = "index.html";
const HTML_SUFFIX: &str = ".html";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("request path contains a parent-directory segment")]
    PathTraversal,
    #[error("request path is not valid UTF-8 after percent-decoding")]
    InvalidEncoding,
}

/// How a request path becomes an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectNameRule {
    /// Every request on the route serves this one object.
    Fixed(String),
    /// The object key is the request path minus the route's prefix.
    FromPath,
}

#[derive(Debug, Clone)]
pub struct RouteConfig {
    pub mount: String,
    pub bucket: String,
    pub path_prefix: Option<String>,
    pub object_name: ObjectNameRule,
    /// `None` disables caching for this route.
    pub cache_ttl: Option<Duration>,
}

impl RouteConfig {
    pub fn provision(settings: &RouteSettings, context: &AppContext) -> Result<Self, InfraError> {
        let bucket = settings.bucket.trim();
        if bucket.is_empty() {
            return Err(InfraError::configuration(format!(
                "route `{}`: bucket is required",
                settings.mount
            )));
        }
        if bucket.contains(':') || bucket.contains('/') {
            return Err(InfraError::configuration(format!(
                "route `{}`: bucket `{bucket}` is not a valid bucket name",
                settings.mount
            )));
        }

        let object_name = match settings.html_file.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => ObjectNameRule::Fixed(fixed_object_key(name)),
            _ => ObjectNameRule::FromPath,
        };

        // TTL only matters when there is a cache to write to.
        let cache_ttl = match context.cache() {
            Some(_) => resolve_ttl(settings.cache_ttl.as_deref(), context.default_ttl()),
            None => None,
        };

        let route = Self {
            mount: settings.mount.clone(),
            bucket: bucket.to_string(),
            path_prefix: settings.path_prefix.clone(),
            object_name,
            cache_ttl,
        };

        info!(
            mount = %route.mount,
            bucket = %route.bucket,
            path_prefix = route.path_prefix.as_deref().unwrap_or(""),
            caching_enabled = route.caching_enabled(),
            cache_ttl = ?route.cache_ttl,
            "provisioned route"
        );

        Ok(route)
    }

    pub fn caching_enabled(&self) -> bool {
        self.cache_ttl.is_some()
    }

    /// Map a raw (still percent-encoded) request path to the object key to fetch.
    pub fn resolve_object_key(&self, raw_path: &str) -> Result<String, RequestError> {
        if raw_path.contains("..") {
            return Err(RequestError::PathTraversal);
        }

        let decoded = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| RequestError::InvalidEncoding)?;
        let decoded: &str = &decoded;
        if decoded.contains("..") {
            return Err(RequestError::PathTraversal);
        }

        let key = match &self.object_name {
            ObjectNameRule::Fixed(name) => name.clone(),
            ObjectNameRule::FromPath => {
                let path = match self.path_prefix.as_deref() {
                    Some(prefix) => decoded.strip_prefix(prefix).unwrap_or(decoded),
                    None => decoded,
                };
                let mut key = path.trim_start_matches('/').to_string();
                if key.is_empty() || key.ends_with('/') {
                    key.push_str(INDEX_DOCUMENT);
                }
                key
            }
        };

        if key.contains("..") {
            return Err(RequestError::PathTraversal);
        }
        Ok(key)
    }
}

fn fixed_object_key(name: &str) -> String {
    if name.ends_with(HTML_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{HTML_SUFFIX}")
    }
}
