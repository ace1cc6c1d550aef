//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::HashSet,
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bucketfront";
const ENV_PREFIX: &str = "BUCKETFRONT";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_MOUNT: &str = "/";
pub(crate) const DEFAULT_MAX_CACHE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub origin: OriginSettings,
    pub cache: CacheSettings,
    pub not_found_file: Option<PathBuf>,
    pub routes: Vec<RouteSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Connection parameters for the S3-compatible origin.
#[derive(Clone)]
pub struct OriginSettings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub secure: bool,
    pub region: String,
}

impl OriginSettings {
    /// Endpoint as a URL, with the scheme chosen by `secure`.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint)
    }
}

impl std::fmt::Debug for OriginSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Cache connection URL; caching is disabled when absent.
    pub url: Option<String>,
    /// Default TTL applied to routes without their own `cache_ttl`.
    pub default_ttl: Option<String>,
    pub max_cache_size: NonZeroU64,
}

/// One served route. TTL strings stay unparsed until provisioning so that an
/// invalid per-route value only disables caching for that route.
#[derive(Debug, Clone, Default)]
pub struct RouteSettings {
    pub mount: String,
    pub bucket: String,
    pub path_prefix: Option<String>,
    pub cache_ttl: Option<String>,
    pub html_file: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: String, reason: String },
}

impl LoadError {
    fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) | Some(Command::Check(args)) => {
            raw.apply_serve_overrides(&args.overrides)
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    origin: RawOriginSettings,
    cache: RawCacheSettings,
    not_found_file: Option<PathBuf>,
    routes: Vec<RawRouteSettings>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(endpoint) = overrides.origin_endpoint.as_ref() {
            self.origin.endpoint = Some(endpoint.clone());
        }
        if let Some(secure) = overrides.origin_secure {
            self.origin.secure = Some(secure);
        }
        if let Some(region) = overrides.origin_region.as_ref() {
            self.origin.region = Some(region.clone());
        }
        if let Some(url) = overrides.cache_url.as_ref() {
            self.cache.url = Some(url.clone());
        }
        if let Some(ttl) = overrides.cache_default_ttl.as_ref() {
            self.cache.default_ttl = Some(ttl.clone());
        }
        if let Some(limit) = overrides.cache_max_cache_size {
            self.cache.max_cache_size = Some(limit);
        }
        if let Some(path) = overrides.not_found_file.as_ref() {
            self.not_found_file = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            origin,
            cache,
            not_found_file,
            routes,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let origin = build_origin_settings(origin)?;
        let cache = build_cache_settings(cache)?;
        let not_found_file = not_found_file.filter(|path| !path.as_os_str().is_empty());
        let routes = build_route_settings(routes)?;

        Ok(Self {
            server,
            logging,
            origin,
            cache,
            not_found_file,
            routes,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let timeout_secs = server
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "server.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let endpoint = non_empty(origin.endpoint)
        .ok_or_else(|| LoadError::invalid("origin.endpoint", "must be specified"))?;
    if endpoint.contains("://") {
        return Err(LoadError::invalid(
            "origin.endpoint",
            "expected `host[:port]` without a scheme; use `origin.secure` to select TLS",
        ));
    }

    let settings = OriginSettings {
        endpoint,
        access_key: origin.access_key.unwrap_or_default(),
        secret_key: origin.secret_key.unwrap_or_default(),
        secure: origin.secure.unwrap_or(false),
        region: non_empty(origin.region).unwrap_or_else(|| DEFAULT_REGION.to_string()),
    };

    Url::parse(&settings.endpoint_url())
        .map_err(|err| LoadError::invalid("origin.endpoint", format!("invalid endpoint: {err}")))?;

    Ok(settings)
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let url = non_empty(cache.url);
    if let Some(value) = url.as_deref() {
        let parsed = Url::parse(value)
            .map_err(|err| LoadError::invalid("cache.url", format!("invalid URL: {err}")))?;
        if !matches!(parsed.scheme(), "redis" | "rediss" | "redis+unix" | "unix") {
            return Err(LoadError::invalid(
                "cache.url",
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }
    }

    let max_cache_size = cache
        .max_cache_size
        .unwrap_or(DEFAULT_MAX_CACHE_SIZE_BYTES);
    let max_cache_size = NonZeroU64::new(max_cache_size)
        .ok_or_else(|| LoadError::invalid("cache.max_cache_size", "must be greater than zero"))?;

    Ok(CacheSettings {
        url,
        default_ttl: non_empty(cache.default_ttl),
        max_cache_size,
    })
}

fn build_route_settings(routes: Vec<RawRouteSettings>) -> Result<Vec<RouteSettings>, LoadError> {
    if routes.is_empty() {
        return Err(LoadError::invalid(
            "routes",
            "at least one route must be configured",
        ));
    }

    let mut mounts = HashSet::new();
    let mut resolved = Vec::with_capacity(routes.len());

    for (index, route) in routes.into_iter().enumerate() {
        let mount = normalize_mount(route.mount)
            .map_err(|reason| LoadError::invalid(format!("routes[{index}].mount"), reason))?;
        if !mounts.insert(mount.clone()) {
            return Err(LoadError::invalid(
                format!("routes[{index}].mount"),
                format!("`{mount}` is mounted more than once"),
            ));
        }

        resolved.push(RouteSettings {
            mount,
            bucket: route.bucket.unwrap_or_default().trim().to_string(),
            path_prefix: non_empty(route.path_prefix),
            cache_ttl: non_empty(route.cache_ttl),
            html_file: non_empty(route.html_file),
        });
    }

    Ok(resolved)
}

fn normalize_mount(mount: Option<String>) -> Result<String, String> {
    let Some(mount) = non_empty(mount) else {
        return Ok(DEFAULT_MOUNT.to_string());
    };
    if !mount.starts_with('/') {
        return Err("mount must start with `/`".to_string());
    }
    if mount.contains('{') || mount.contains('}') {
        return Err("mount must be a literal path".to_string());
    }
    let trimmed = mount.trim_end_matches('/');
    if trimmed.is_empty() {
        Ok(DEFAULT_MOUNT.to_string())
    } else {
        Ok(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    secure: Option<bool>,
    region: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    url: Option<String>,
    default_ttl: Option<String>,
    max_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRouteSettings {
    mount: Option<String>,
    bucket: Option<String>,
    path_prefix: Option<String>,
    cache_ttl: Option<String>,
    html_file: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
