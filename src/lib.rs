//! bucketfront: serves static HTML from S3-compatible buckets through a cache-aside KV layer.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod origin;
pub mod util;
