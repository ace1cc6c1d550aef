//! Cache key definitions.

use std::fmt;

/// Namespace prefix shared by every entry this service writes.
pub const CACHE_KEY_NAMESPACE: &str = "minio-cache";

/// Cache key for one origin object, `minio-cache:<bucket>:<objectKey>`.
///
/// Bucket names never contain `:`, so the first separator after the
/// namespace splits bucket from object key unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey(String);

impl LookupKey {
    pub fn new(bucket: &str, object_key: &str) -> Self {
        Self(format!("{CACHE_KEY_NAMESPACE}:{bucket}:{object_key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_matches_wire_layout() {
        let key = LookupKey::new("site", "index.html");
        assert_eq!(key.as_str(), "minio-cache:site:index.html");
    }

    #[test]
    fn key_is_deterministic() {
        assert_eq!(
            LookupKey::new("docs", "guide/intro.html"),
            LookupKey::new("docs", "guide/intro.html")
        );
    }

    #[test]
    fn distinct_pairs_produce_distinct_keys() {
        let pairs = [
            ("site", "a:b.html"),
            ("site-a", "b.html"),
            ("site", "a/b.html"),
            ("sitea", "b.html"),
            ("site", "index.html"),
            ("other", "index.html"),
        ];
        let keys: std::collections::HashSet<_> = pairs
            .iter()
            .map(|(bucket, key)| LookupKey::new(bucket, key))
            .collect();
        assert_eq!(keys.len(), pairs.len());
    }

    #[test]
    fn object_key_with_colon_stays_inside_key_segment() {
        let key = LookupKey::new("site", "a:b.html");
        let rest = key
            .as_str()
            .strip_prefix("minio-cache:")
            .expect("namespace prefix");
        let (bucket, object) = rest.split_once(':').expect("separator");
        assert_eq!(bucket, "site");
        assert_eq!(object, "a:b.html");
    }
}
