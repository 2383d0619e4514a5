// ABOUTME: Request tracing middleware for correlation and structured logging
// ABOUTME: Creates one span per HTTP request carrying method, path and a request ID
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use axum::{body::Body, http::Request};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::TraceLayer,
};
use tracing::Span;
use uuid::Uuid;

/// Header clients may set to correlate their own logs with ours
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the span for one request, reusing the caller's `x-request-id` when present
pub fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| format!("req_{}", Uuid::new_v4().simple()), str::to_owned);

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

/// Trace layer that wraps every request in [`request_span`]
#[must_use]
pub fn with_request_tracing(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, fn(&Request<Body>) -> Span> {
    TraceLayer::new_for_http().make_span_with(request_span::<Body> as fn(&Request<Body>) -> Span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_span_builds_without_header() {
        let request = Request::builder()
            .uri("/health")
            .body(())
            .unwrap_or_else(|_| Request::new(()));
        let _span = request_span(&request);
    }
}
