//! Request spans for the request-logging stage.

use axum::http::Request;
use tracing::Span;

use crate::http::request::RequestIdExt;

/// Span carrying the request id, method and path of one request.
pub fn make_span<B>(request: &Request<B>) -> Span {
    ::tracing::info_span!(
        "http_request",
        request_id = %request.request_id().unwrap_or("unknown"),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
