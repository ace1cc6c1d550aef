use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the bucketfront binary.
#[derive(Debug, Parser)]
#[command(
    name = "bucketfront",
    version,
    about = "Cache-aside gateway for static HTML stored in S3-compatible buckets"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BUCKETFRONT_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve(Box<ServeArgs>),
    /// Validate configuration and verify the cache and origin clients can be built.
    Check(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the per-request deadline.
    #[arg(long = "server-request-timeout-seconds", value_name = "SECONDS")]
    pub server_request_timeout_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the object storage endpoint (`host:port`).
    #[arg(long = "origin-endpoint", value_name = "HOST:PORT")]
    pub origin_endpoint: Option<String>,

    /// Toggle TLS for the object storage endpoint.
    #[arg(
        long = "origin-secure",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub origin_secure: Option<bool>,

    /// Override the object storage region.
    #[arg(long = "origin-region", value_name = "REGION")]
    pub origin_region: Option<String>,

    /// Override the cache connection URL (`redis://host:port/db`).
    #[arg(long = "cache-url", value_name = "URL")]
    pub cache_url: Option<String>,

    /// Override the default cache TTL (for example `10m` or `1h`).
    #[arg(long = "cache-default-ttl", value_name = "DURATION")]
    pub cache_default_ttl: Option<String>,

    /// Override the largest object size, in bytes, that will be cached.
    #[arg(long = "cache-max-cache-size", value_name = "BYTES")]
    pub cache_max_cache_size: Option<u64>,

    /// Override the file served when an object does not exist.
    #[arg(long = "not-found-file", value_name = "PATH")]
    pub not_found_file: Option<PathBuf>,
}
