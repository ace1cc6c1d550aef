//! Emits an in-memory object with conditional-request and byte-range handling.

use std::ops::Range;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;

use crate::{
    application::orchestrator::ServedObject, origin::DEFAULT_CONTENT_TYPE, util::http_date,
};

pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");

/// Build the response for `object`, honoring preconditions, `Range` and `HEAD`.
pub fn serve_content(method: &Method, request: &HeaderMap, object: ServedObject) -> Response {
    let validators = Validators::new(&object);

    let mut headers = HeaderMap::new();
    let content_type = if object.content_type.is_empty() {
        DEFAULT_CONTENT_TYPE
    } else {
        object.content_type.as_str()
    };
    insert_str(&mut headers, header::CONTENT_TYPE, content_type);
    if let Some(etag) = validators.etag {
        insert_str(&mut headers, header::ETAG, etag);
    }
    if let Some(formatted) = validators.last_modified.and_then(http_date::format) {
        insert_str(&mut headers, header::LAST_MODIFIED, &formatted);
    }
    headers.insert(
        X_CACHE_STATUS,
        HeaderValue::from_static(object.provenance.as_str()),
    );

    match validators.evaluate(method, request) {
        Precondition::Proceed => {}
        Precondition::NotModified => {
            headers.remove(header::CONTENT_TYPE);
            return (StatusCode::NOT_MODIFIED, headers).into_response();
        }
        Precondition::Failed => {
            headers.remove(header::CONTENT_TYPE);
            return (StatusCode::PRECONDITION_FAILED, headers).into_response();
        }
    }

    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let total = object.content.len() as u64;
    let mut status = StatusCode::OK;
    let mut body = object.content.clone();

    if let Some(range) = request.get(header::RANGE).and_then(|v| v.to_str().ok())
        && validators.if_range_allows(request)
    {
        match parse_range(range, total) {
            RangeRequest::Satisfiable(selected) => {
                insert_str(
                    &mut headers,
                    header::CONTENT_RANGE,
                    &format!(
                        "bytes {}-{}/{total}",
                        selected.start,
                        selected.end.saturating_sub(1)
                    ),
                );
                body = body.slice(selected.start as usize..selected.end as usize);
                status = StatusCode::PARTIAL_CONTENT;
            }
            RangeRequest::Unsatisfiable => {
                insert_str(&mut headers, header::CONTENT_RANGE, &format!("bytes */{total}"));
                headers.remove(header::CONTENT_TYPE);
                return (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response();
            }
            RangeRequest::Ignore => {}
        }
    }

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len() as u64));

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(body)
    };
    (status, headers, body).into_response()
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Precondition {
    Proceed,
    NotModified,
    Failed,
}

struct Validators<'a> {
    etag: Option<&'a str>,
    // `None` when the origin never reported a modification time.
    last_modified: Option<OffsetDateTime>,
}

impl<'a> Validators<'a> {
    fn new(object: &'a ServedObject) -> Self {
        let etag = Some(object.etag.as_str()).filter(|etag| !etag.is_empty());
        let last_modified =
            Some(object.last_modified).filter(|ts| *ts != OffsetDateTime::UNIX_EPOCH);
        Self {
            etag,
            last_modified,
        }
    }

    fn evaluate(&self, method: &Method, request: &HeaderMap) -> Precondition {
        if let Some(if_match) = header_str(request, header::IF_MATCH) {
            if !self.matches_any(if_match, Comparison::Strong) {
                return Precondition::Failed;
            }
        } else if let Some(since) =
            header_str(request, header::IF_UNMODIFIED_SINCE).and_then(http_date::parse)
            && let Some(modified) = self.last_modified
            && modified.unix_timestamp() > since.unix_timestamp()
        {
            return Precondition::Failed;
        }

        let safe = method == Method::GET || method == Method::HEAD;

        if let Some(if_none_match) = header_str(request, header::IF_NONE_MATCH) {
            if self.matches_any(if_none_match, Comparison::Weak) {
                return if safe {
                    Precondition::NotModified
                } else {
                    Precondition::Failed
                };
            }
        } else if safe
            && let Some(since) =
                header_str(request, header::IF_MODIFIED_SINCE).and_then(http_date::parse)
            && let Some(modified) = self.last_modified
            && modified.unix_timestamp() <= since.unix_timestamp()
        {
            return Precondition::NotModified;
        }

        Precondition::Proceed
    }

    fn if_range_allows(&self, request: &HeaderMap) -> bool {
        let Some(if_range) = header_str(request, header::IF_RANGE) else {
            return true;
        };
        let if_range = if_range.trim();
        if if_range.starts_with('"') || if_range.starts_with("W/") {
            return match (self.etag.and_then(EntityTag::parse), EntityTag::parse(if_range)) {
                (Some(ours), Some(theirs)) => ours.strong_eq(&theirs),
                _ => false,
            };
        }
        match (self.last_modified, http_date::parse(if_range)) {
            (Some(modified), Some(date)) => modified.unix_timestamp() == date.unix_timestamp(),
            _ => false,
        }
    }

    fn matches_any(&self, list: &str, comparison: Comparison) -> bool {
        if list.trim() == "*" {
            return true;
        }
        let Some(ours) = self.etag.and_then(EntityTag::parse) else {
            return false;
        };
        list.split(',')
            .filter_map(|candidate| EntityTag::parse(candidate.trim()))
            .any(|theirs| match comparison {
                Comparison::Strong => ours.strong_eq(&theirs),
                Comparison::Weak => ours.weak_eq(&theirs),
            })
    }
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Strong,
    Weak,
}

#[derive(Debug, Clone, Copy)]
struct EntityTag<'a> {
    weak: bool,
    opaque: &'a str,
}

impl<'a> EntityTag<'a> {
    fn parse(raw: &'a str) -> Option<Self> {
        let (weak, rest) = match raw.strip_prefix("W/") {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let opaque = rest.strip_prefix('"')?.strip_suffix('"')?;
        Some(Self { weak, opaque })
    }

    fn strong_eq(&self, other: &EntityTag<'_>) -> bool {
        !self.weak && !other.weak && self.opaque == other.opaque
    }

    fn weak_eq(&self, other: &EntityTag<'_>) -> bool {
        self.opaque == other.opaque
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RangeRequest {
    Satisfiable(Range<u64>),
    Unsatisfiable,
    /// Serve the whole body: malformed, multi-range or larger-than-body requests.
    Ignore,
}

fn parse_range(raw: &str, total: u64) -> RangeRequest {
    let Some(spec) = raw.trim().strip_prefix("bytes=") else {
        return RangeRequest::Ignore;
    };

    let mut selected = Vec::new();
    let mut saw_any = false;
    for part in spec.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        saw_any = true;
        let Some((start, end)) = part.split_once('-') else {
            return RangeRequest::Unsatisfiable;
        };
        let (start, end) = (start.trim(), end.trim());

        let range = if start.is_empty() {
            // Suffix form `-N`: the final N bytes.
            let Ok(suffix) = end.parse::<u64>() else {
                return RangeRequest::Unsatisfiable;
            };
            if suffix == 0 || total == 0 {
                continue;
            }
            total.saturating_sub(suffix)..total
        } else {
            let Ok(first) = start.parse::<u64>() else {
                return RangeRequest::Unsatisfiable;
            };
            if first >= total {
                continue;
            }
            let last = if end.is_empty() {
                total - 1
            } else {
                match end.parse::<u64>() {
                    Ok(last) if last >= first => last.min(total - 1),
                    _ => return RangeRequest::Unsatisfiable,
                }
            };
            first..last + 1
        };
        selected.push(range);
    }

    if !saw_any {
        return RangeRequest::Unsatisfiable;
    }
    match selected.len() {
        0 => RangeRequest::Unsatisfiable,
        1 => RangeRequest::Satisfiable(selected.remove(0)),
        _ => RangeRequest::Ignore,
    }
}
