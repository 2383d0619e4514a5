// ABOUTME: System-wide constants and defaults for the Hojaega marketplace server
// ABOUTME: Holds OTP bounds, subscription periods, validation limits and configuration defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # Constants Module
//!
//! Hardcoded limits and the defaults used when an environment variable is absent.

/// Service identity used in logs and health responses
pub mod service_names {
    /// Name reported by the server binary
    pub const HOJAEGA_SERVER: &str = "hojaega-server";

    /// Server version from Cargo.toml
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// One-time passcode limits
pub mod otp {
    /// Code length used when the caller does not ask for one
    pub const DEFAULT_CODE_LENGTH: usize = 6;
    /// Shortest code that may be issued
    pub const MIN_CODE_LENGTH: usize = 4;
    /// Longest code that may be issued
    pub const MAX_CODE_LENGTH: usize = 8;

    /// Validity window used when the caller does not ask for one
    pub const DEFAULT_TTL_SECS: i64 = 300;
    /// Shortest validity window
    pub const MIN_TTL_SECS: i64 = 60;
    /// Longest validity window
    pub const MAX_TTL_SECS: i64 = 900;

    /// Failed verifications tolerated before a code is locked
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Contact numbers accepted by the OTP endpoints
    pub const MIN_CONTACT_DIGITS: usize = 6;
    /// Contact numbers accepted by the OTP endpoints
    pub const MAX_CONTACT_DIGITS: usize = 15;

    /// Trailing digits compared when matching a contact against stored accounts
    pub const TRAILING_MATCH_DIGITS: usize = 7;

    /// Superseded codes checked when a presented code does not match the live one
    pub const SUPERSEDED_LOOKBACK: i64 = 3;

    /// Seconds between purges of spent and expired codes
    pub const PURGE_INTERVAL_SECS: u64 = 3600;
}

/// Subscription lifecycle
pub mod subscription {
    /// Period granted to a provider on signup
    pub const SIGNUP_GRANT_MONTHS: u32 = 1;
    /// Period granted by a payment upload
    pub const PAYMENT_UPLOAD_MONTHS: u32 = 1;
    /// Longest renewal accepted in a single request
    pub const MAX_RENEWAL_MONTHS: u32 = 24;
    /// Seconds between background expiry sweeps
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
    /// Seconds in a day, used for expiry arithmetic
    pub const SECONDS_PER_DAY: i64 = 86_400;
}

/// Offer negotiation
pub mod negotiation {
    /// Offer validity used when the sender does not provide one
    pub const DEFAULT_OFFER_VALIDITY_HOURS: i64 = 24;
    /// Longest offer validity (30 days)
    pub const MAX_OFFER_VALIDITY_HOURS: i64 = 720;
    /// Upper bound on free-text message bodies
    pub const MAX_CONTENT_LENGTH: usize = 4000;
}

/// Pagination of message listings
pub mod pagination {
    /// Page size used when none is given
    pub const DEFAULT_PAGE_SIZE: i64 = 50;
    /// Largest page size a client may request
    pub const MAX_PAGE_SIZE: i64 = 100;
}

/// Account field validation
pub mod accounts {
    /// PINs are exactly this many digits
    pub const PIN_LENGTH: usize = 4;
    /// Name and city bounds
    pub const MIN_NAME_LENGTH: usize = 2;
    /// Name and city bounds
    pub const MAX_NAME_LENGTH: usize = 100;
    /// Skillset descriptions must be at least this long
    pub const MIN_SKILLSET_LENGTH: usize = 5;
    /// Phone numbers carry at least this many digits
    pub const MIN_PHONE_DIGITS: usize = 10;
    /// Phone numbers carry at most this many digits
    pub const MAX_PHONE_DIGITS: usize = 15;
}

/// Default values for environment configuration
pub mod defaults {
    /// HTTP listen port
    pub const HTTP_PORT: u16 = 3000;
    /// HTTP listen address
    pub const HOST: &str = "0.0.0.0";
    /// `SQLite` database location
    pub const DATABASE_URL: &str = "sqlite:./data/hojaega.db";
    /// bcrypt work factor for PINs and OTP codes
    pub const BCRYPT_COST: u32 = 10;
    /// Origins allowed by the CORS layer
    pub const CORS_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
    /// `TextBee` gateway base URL
    pub const TEXTBEE_BASE_URL: &str = "https://api.textbee.dev/api/v1";
    /// Age after which spent OTP rows are purged
    pub const OTP_PURGE_AFTER_HOURS: i64 = 24;
    /// Timeout applied to outbound SMS requests
    pub const SMS_TIMEOUT_SECS: u64 = 10;
}
