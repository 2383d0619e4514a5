// ABOUTME: Configuration module for centralized server settings
// ABOUTME: Re-exports the environment-driven server configuration types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! Configuration module for the Hojaega server
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file); see [`environment::ServerConfig::from_env`].

/// Environment and server configuration
pub mod environment;

pub use environment::{
    DatabaseConfig, DatabaseUrl, Environment, LogLevel, OtpConfig, SecurityConfig, ServerConfig,
    SmsConfig, SubscriptionConfig, TextBeeConfig,
};
