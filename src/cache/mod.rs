//! Cache-aside storage for origin objects.
//!
//! - [`LookupKey`]: namespaced key per (bucket, object key)
//! - [`CachedEnvelope`]: metadata plus payload, serialized as one JSON value
//! - [`KvCache`]: capability trait over the remote store, with a Redis implementation
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! url = "redis://127.0.0.1:6379/0"
//! default_ttl = "10m"
//! max_cache_size = 10485760
//! ```

mod envelope;
mod keys;
mod policy;
mod redis_cache;
mod store;

pub use envelope::{CachedEnvelope, EnvelopeError};
pub use keys::{CACHE_KEY_NAMESPACE, LookupKey};
pub use policy::resolve_ttl;
pub use redis_cache::RedisCache;
pub use store::{CacheError, KvCache};
