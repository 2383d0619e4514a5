// ABOUTME: Route module organization for the Hojaega HTTP and WebSocket endpoints
// ABOUTME: Each domain module holds route definitions and thin handlers over the service layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! HTTP routes grouped by domain
//!
//! Handlers parse the request, call one service method and wrap the result in
//! the `{ "success": true, ... }` envelope. Failures flow back as
//! [`crate::errors::AppError`], which renders the error envelope.

/// Consumer account routes
pub mod consumers;
/// Conversation lifecycle and listing routes
pub mod conversations;
/// JSON, query and path extractors that reject with `AppError`
pub mod extract;
/// Health check route
pub mod health;
/// Message, offer, charge and payment routes
pub mod messages;
/// One-time passcode and PIN reset routes
pub mod otp;
/// Service provider account and subscription routes
pub mod providers;
/// WebSocket upgrade route
pub mod websocket;

pub use consumers::ConsumerRoutes;
pub use conversations::ConversationRoutes;
pub use health::HealthRoutes;
pub use messages::MessageRoutes;
pub use otp::OtpRoutes;
pub use providers::ProviderRoutes;
pub use websocket::WebSocketRoutes;
