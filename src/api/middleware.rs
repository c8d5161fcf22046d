use crate::api::AppState;
use crate::error::AppError;
use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, Request, Response, header, request::Parts},
};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Access token presented as `Authorization: Bearer <token>`.
#[derive(Debug)]
pub struct BearerToken(pub String);

#[must_use]
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        bearer_from_headers(&parts.headers).map(|t| Self(t.to_string())).ok_or(AppError::Unauthorized)
    }
}

/// Reuses a caller-supplied `x-request-id` when present, otherwise mints a UUID.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        if let Some(existing) = request.headers().get(REQUEST_ID_HEADER)
            && !existing.is_empty()
        {
            return Some(RequestId::new(existing.clone()));
        }
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}

/// Root span for every API request, keyed by the request id set below it.
pub fn make_request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "request",
        "request_id" = %request_id,
        "http.request.method" = %request.method(),
        "url.path" = %request.uri().path(),
        "http.response.status_code" = tracing::field::Empty,
        "otel.kind" = "server",
    )
}

pub fn record_response(response: &Response<Body>, latency: Duration, span: &Span) {
    let status = response.status().as_u16();
    span.record("http.response.status_code", status);
    tracing::info!(latency_ms = %latency.as_millis(), status = %status, "request completed");
}

pub fn record_failure(failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    tracing::error!(error = %failure, latency_ms = %latency.as_millis(), "request failed");
}
