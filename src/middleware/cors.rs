// ABOUTME: CORS middleware configuration for HTTP API endpoints
// ABOUTME: Builds the allowed origin list from the server's security settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::config::ServerConfig;
use axum::http::{header::HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Configure CORS settings for the API and WebSocket endpoints
///
/// An empty origin list or a `*` entry allows any origin. Otherwise only the
/// configured origins that parse as header values are allowed; when none of
/// them parse the layer falls back to any origin.
///
/// ```bash
/// export CORS_ALLOWED_ORIGINS="https://app.hojaega.pk,https://admin.hojaega.pk"
/// ```
#[must_use]
pub fn setup_cors(config: &ServerConfig) -> CorsLayer {
    let origins = &config.security.cors_origins;
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin.trim()).ok())
            .collect();
        if parsed.is_empty() {
            AllowOrigin::any()
        } else {
            AllowOrigin::list(parsed)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("origin"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_accepts_explicit_origin_list() {
        let mut config = ServerConfig::default();
        config.security.cors_origins = vec!["https://app.hojaega.pk".to_owned()];
        // Construction must not panic for a concrete list
        let _layer = setup_cors(&config);
    }
}
