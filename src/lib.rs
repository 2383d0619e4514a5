// ABOUTME: Main library entry point for the Hojaega marketplace server
// ABOUTME: Exposes accounts, OTP, subscriptions, conversations, negotiation and real-time delivery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

// Crate-level attributes:
// - recursion_limit: raised for serde/thiserror derives on nested payload enums
// - deny(unsafe_code): no unsafe anywhere in the crate
#![recursion_limit = "256"]
#![deny(unsafe_code)]

//! # Hojaega Server
//!
//! Backend for a marketplace where service providers and consumers find each
//! other, negotiate a price inside a conversation and settle it.
//!
//! ## Features
//!
//! - **Accounts**: provider and consumer signup, PIN sign-in, OTP-backed PIN reset
//! - **One-time passcodes**: hashed, attempt-limited, superseded on re-request
//! - **Subscriptions**: calendar-month renewals with a payment ledger and expiry sweeps
//! - **Negotiation**: offers, charges, payments, acceptance and decline as typed messages
//! - **Real-time delivery**: WebSocket presence with per-user and per-conversation channels
//!
//! ## Architecture
//!
//! HTTP handlers in [`routes`] call services in [`services`], which persist to
//! [`database`] and publish [`realtime::DomainEvent`]s. A dispatcher task routes
//! those events through the [`realtime::PresenceHub`] to connected sockets.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hojaega_server::config::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Hojaega server configured with port: HTTP={}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Environment-driven server configuration
pub mod config;

/// Application constants and defaults
pub mod constants;

/// PIN and OTP code hashing
pub mod credentials;

/// `SQLite` record store
pub mod database;

/// Unified error handling
pub mod errors;

/// Structured logging setup and domain log helpers
pub mod logging;

/// HTTP middleware layers
pub mod middleware;

/// Domain model shared by storage, services and routes
pub mod models;

/// Outbound SMS delivery
pub mod notifications;

/// Domain events, presence tracking and WebSocket transport
pub mod realtime;

/// Shared resource container
pub mod resources;

/// HTTP route groups
pub mod routes;

/// Server bootstrap
pub mod server;

/// Business logic services
pub mod services;
