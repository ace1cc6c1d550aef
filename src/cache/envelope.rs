//! Serialized form of a cached origin object.
//!
//! The JSON layout (`ContentType`, `ETag`, `LastModified`, `Size`, `Content`)
//! matches entries written by earlier deployments, so both can share a cache.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("cache entry could not be parsed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("cache entry declares {declared} bytes but carries {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
}

/// Metadata and payload of one origin object, stored as a single cache value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CachedEnvelope {
    content_type: String,
    #[serde(rename = "ETag")]
    etag: String,
    #[serde(with = "time::serde::rfc3339")]
    last_modified: OffsetDateTime,
    size: u64,
    #[serde(with = "base64_content")]
    content: Bytes,
}

impl CachedEnvelope {
    /// Build an envelope whose size is the length of `content`.
    pub fn new(
        content_type: impl Into<String>,
        etag: impl Into<String>,
        last_modified: OffsetDateTime,
        content: Bytes,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            etag: etag.into(),
            last_modified,
            size: content.len() as u64,
            content,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a stored value, rejecting entries whose size disagrees with their payload.
    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_slice(raw)?;
        let actual = envelope.content.len() as u64;
        if envelope.size != actual {
            return Err(EnvelopeError::SizeMismatch {
                declared: envelope.size,
                actual,
            });
        }
        Ok(envelope)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    pub fn last_modified(&self) -> OffsetDateTime {
        self.last_modified
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_parts(self) -> (String, String, OffsetDateTime, Bytes) {
        (self.content_type, self.etag, self.last_modified, self.content)
    }
}

mod base64_content {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S>(content: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(content))
    }

    // Empty payloads may have been stored as `null`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = Option::<String>::deserialize(deserializer)?;
        match encoded {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Bytes::from)
                .map_err(D::Error::custom),
            None => Ok(Bytes::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn sample(content: &'static [u8]) -> CachedEnvelope {
        CachedEnvelope::new(
            "text/html",
            "\"abc123\"",
            datetime!(2024-01-01 00:00:00 UTC),
            Bytes::from_static(content),
        )
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let envelope = sample(b"<html></html>");
        let decoded = CachedEnvelope::decode(&envelope.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.size(), 13);
    }

    #[test]
    fn empty_content_round_trips() {
        let envelope = sample(b"");
        let decoded = CachedEnvelope::decode(&envelope.encode().expect("encode")).expect("decode");
        assert!(decoded.content().is_empty());
        assert_eq!(decoded.size(), 0);
    }

    #[test]
    fn large_content_round_trips() {
        let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        let envelope = CachedEnvelope::new(
            "text/html",
            "\"big\"",
            datetime!(2024-06-30 12:34:56 UTC),
            Bytes::from(payload.clone()),
        );
        let decoded = CachedEnvelope::decode(&envelope.encode().expect("encode")).expect("decode");
        assert_eq!(decoded.content().as_ref(), payload.as_slice());
    }

    #[test]
    fn encodes_pascal_case_fields_with_base64_content() {
        let encoded = sample(b"hi").encode().expect("encode");
        let value: serde_json::Value = serde_json::from_slice(&encoded).expect("json");
        assert_eq!(value["ContentType"], "text/html");
        assert_eq!(value["ETag"], "\"abc123\"");
        assert_eq!(value["LastModified"], "2024-01-01T00:00:00Z");
        assert_eq!(value["Size"], 2);
        assert_eq!(value["Content"], "aGk=");
    }

    #[test]
    fn accepts_entries_with_fractional_seconds_and_offsets() {
        let raw = br#"{"ContentType":"text/html","ETag":"\"e\"","LastModified":"2024-01-01T08:00:00.123456789+08:00","Size":2,"Content":"aGk="}"#;
        let decoded = CachedEnvelope::decode(raw).expect("decode");
        assert_eq!(
            decoded.last_modified().unix_timestamp(),
            datetime!(2024-01-01 00:00:00 UTC).unix_timestamp()
        );
        assert_eq!(decoded.content().as_ref(), b"hi");
    }

    #[test]
    fn null_content_decodes_as_empty() {
        let raw = br#"{"ContentType":"text/html","ETag":"","LastModified":"2024-01-01T00:00:00Z","Size":0,"Content":null}"#;
        let decoded = CachedEnvelope::decode(raw).expect("decode");
        assert!(decoded.content().is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        let err = CachedEnvelope::decode(b"not json").expect_err("must fail");
        assert!(matches!(err, EnvelopeError::Malformed(_)));
    }

    #[test]
    fn size_disagreement_is_rejected() {
        let raw = br#"{"ContentType":"text/html","ETag":"","LastModified":"2024-01-01T00:00:00Z","Size":10,"Content":"aGk="}"#;
        let err = CachedEnvelope::decode(raw).expect_err("must fail");
        assert!(matches!(
            err,
            EnvelopeError::SizeMismatch {
                declared: 10,
                actual: 2
            }
        ));
    }
}
