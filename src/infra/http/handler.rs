use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

use crate::application::{
    context::FallbackPage,
    error::{ErrorReport, HttpError},
    orchestrator::{CacheAsideService, Outcome},
};

use super::content::serve_content;

const SOURCE: &str = "infra::http::handler";
const NOT_FOUND_BODY: &str = "404 page not found";
const ALLOWED_METHODS: &str = "GET, HEAD";

#[derive(Clone)]
pub(super) struct RouteState {
    pub service: CacheAsideService,
    pub request_timeout: Duration,
}

pub(super) async fn serve_object(
    State(state): State<RouteState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return method_not_allowed(&method);
    }

    let outcome =
        tokio::time::timeout(state.request_timeout, state.service.handle(uri.path())).await;

    match outcome {
        Ok(Ok(Outcome::Served(object))) => serve_content(&method, &headers, object),
        Ok(Ok(Outcome::NotFound(fallback))) => not_found(&method, fallback),
        Ok(Err(err)) => HttpError::from(err).into_response(),
        Err(_) => HttpError::new(
            SOURCE,
            StatusCode::GATEWAY_TIMEOUT,
            "Gateway Timeout",
            format!(
                "request exceeded {}s deadline",
                state.request_timeout.as_secs()
            ),
        )
        .into_response(),
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn method_not_allowed(method: &Method) -> Response {
    let mut response = HttpError::new(
        SOURCE,
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed",
        format!("method {method} is not served"),
    )
    .into_response();
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    response
}

fn not_found(method: &Method, fallback: Option<FallbackPage>) -> Response {
    let mut response = match fallback {
        Some(page) => {
            let mut response = if method == Method::HEAD {
                (StatusCode::NOT_FOUND, Body::empty()).into_response()
            } else {
                (StatusCode::NOT_FOUND, Body::from(page.content.clone())).into_response()
            };
            if let Ok(value) = HeaderValue::from_str(&page.content_type) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            response
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(page.content.len()));
            response
        }
        None => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
    };
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "object not found").attach(&mut response);
    response
}
