use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "bucketfront_cache_hit_total",
            Unit::Count,
            "Total number of requests answered from the cache."
        );
        describe_counter!(
            "bucketfront_cache_miss_total",
            Unit::Count,
            "Total number of cache lookups that found no entry."
        );
        describe_counter!(
            "bucketfront_cache_corrupt_total",
            Unit::Count,
            "Total number of cache entries that failed to decode."
        );
        describe_counter!(
            "bucketfront_cache_error_total",
            Unit::Count,
            "Total number of cache GET or SET failures."
        );
        describe_counter!(
            "bucketfront_cache_store_total",
            Unit::Count,
            "Total number of objects written to the cache."
        );
        describe_counter!(
            "bucketfront_cache_skip_oversize_total",
            Unit::Count,
            "Total number of objects not cached because they exceed max_cache_size."
        );
        describe_counter!(
            "bucketfront_origin_error_total",
            Unit::Count,
            "Total number of origin fetches that failed for reasons other than not-found."
        );
        describe_histogram!(
            "bucketfront_origin_fetch_ms",
            Unit::Milliseconds,
            "Origin stat and read latency in milliseconds."
        );
    });
}
