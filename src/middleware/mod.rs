// ABOUTME: HTTP middleware layers shared by every route group
// ABOUTME: CORS policy from configuration and per-request tracing spans with request IDs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

pub mod cors;
pub mod tracing;

pub use cors::setup_cors;
pub use self::tracing::{request_span, with_request_tracing};
