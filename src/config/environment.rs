// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses environment variables into typed server, OTP, subscription and SMS settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! Environment-based configuration management for production deployment

use crate::constants::{defaults, otp, subscription};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Strongly typed log level configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Informational output
    #[default]
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development; OTP codes and internal errors are echoed to clients
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path of the database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error for URLs naming a database engine other than `SQLite`
    pub fn parse_url(s: &str) -> Result<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            let path_str = path_str.trim_start_matches("//");
            if path_str == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path_str),
                })
            }
        } else if s.contains("://") {
            Err(anyhow!("Unsupported database URL scheme: {s}"))
        } else {
            // Bare paths are treated as SQLite files
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/hojaega.db"),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    pub host: String,
    /// HTTP API port
    pub http_port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Log level
    pub log_level: LogLevel,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security settings
    pub security: SecurityConfig,
    /// OTP issuance settings
    pub otp: OtpConfig,
    /// Subscription housekeeping settings
    pub subscription: SubscriptionConfig,
    /// Outbound SMS settings
    pub sms: SmsConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// CORS allowed origins (`*` allows any)
    pub cors_origins: Vec<String>,
    /// bcrypt work factor used for PINs and OTP codes
    pub bcrypt_cost: u32,
}

/// OTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    /// Failed verifications tolerated per code
    pub max_attempts: u32,
    /// Return issued codes in HTTP responses (development only)
    pub expose_codes: bool,
    /// Age after which spent codes are purged
    pub purge_after_hours: i64,
}

/// Subscription housekeeping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Seconds between background sweeps, 0 disables the sweeper
    pub sweep_interval_secs: u64,
}

/// SMS gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    /// `TextBee` credentials, absent when codes are only logged
    pub textbee: Option<TextBeeConfig>,
}

/// `TextBee` gateway credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct TextBeeConfig {
    /// Gateway base URL
    pub base_url: String,
    /// Registered device identifier
    pub device_id: String,
    /// API key sent in the `x-api-key` header
    pub api_key: String,
}

impl fmt::Debug for TextBeeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBeeConfig")
            .field("base_url", &self.base_url)
            .field("device_id", &self.device_id)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_owned(),
            http_port: defaults::HTTP_PORT,
            environment: Environment::Development,
            log_level: LogLevel::Info,
            database: DatabaseConfig {
                url: DatabaseUrl::default(),
            },
            security: SecurityConfig {
                cors_origins: parse_origins(defaults::CORS_ALLOWED_ORIGINS),
                bcrypt_cost: defaults::BCRYPT_COST,
            },
            otp: OtpConfig {
                max_attempts: otp::DEFAULT_MAX_ATTEMPTS,
                expose_codes: true,
                purge_after_hours: defaults::OTP_PURGE_AFTER_HOURS,
            },
            subscription: SubscriptionConfig {
                sweep_interval_secs: subscription::DEFAULT_SWEEP_INTERVAL_SECS,
            },
            sms: SmsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or if
    /// the resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            warn!("No .env file found or failed to load: {e}");
        }

        let environment = Environment::from_str_or_default(
            &env::var("ENVIRONMENT")
                .or_else(|_| env::var("NODE_ENV"))
                .unwrap_or_else(|_| "development".to_owned()),
        );

        let config = Self {
            host: env_var_or("HOST", defaults::HOST),
            http_port: parse_env("HTTP_PORT", defaults::HTTP_PORT)?,
            environment,
            log_level: LogLevel::from_str_or_default(&env_var_or("LOG_LEVEL", "info")),
            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", defaults::DATABASE_URL))?,
            },
            security: SecurityConfig {
                cors_origins: parse_origins(&env_var_or(
                    "CORS_ALLOWED_ORIGINS",
                    defaults::CORS_ALLOWED_ORIGINS,
                )),
                bcrypt_cost: parse_env("BCRYPT_COST", defaults::BCRYPT_COST)?,
            },
            otp: OtpConfig {
                max_attempts: parse_env("OTP_MAX_ATTEMPTS", otp::DEFAULT_MAX_ATTEMPTS)?,
                expose_codes: parse_env("OTP_EXPOSE_CODES", environment.is_development())?,
                purge_after_hours: parse_env(
                    "OTP_PURGE_AFTER_HOURS",
                    defaults::OTP_PURGE_AFTER_HOURS,
                )?,
            },
            subscription: SubscriptionConfig {
                sweep_interval_secs: parse_env(
                    "SUBSCRIPTION_SWEEP_INTERVAL_SECS",
                    subscription::DEFAULT_SWEEP_INTERVAL_SECS,
                )?,
            },
            sms: SmsConfig {
                textbee: textbee_from_env(),
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error when a value is outside of its usable range
    pub fn validate(&self) -> Result<()> {
        if !(4..=31).contains(&self.security.bcrypt_cost) {
            return Err(anyhow!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                self.security.bcrypt_cost
            ));
        }

        if self.otp.max_attempts == 0 {
            return Err(anyhow!("OTP_MAX_ATTEMPTS must be at least 1"));
        }

        if self.otp.purge_after_hours < 1 {
            return Err(anyhow!("OTP_PURGE_AFTER_HOURS must be at least 1"));
        }

        if self.environment.is_production() && self.otp.expose_codes {
            warn!("OTP_EXPOSE_CODES is enabled in production; issued codes will be returned to clients");
        }

        if self.sms.textbee.is_none() {
            warn!("TEXTBEE_DEVICE_ID/TEXTBEE_API_KEY not set; OTP codes will only be logged");
        }

        Ok(())
    }

    /// Address the HTTP listener binds to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Hojaega Server Configuration:\n\
             - Environment: {}\n\
             - Listen: {}\n\
             - Log Level: {}\n\
             - Database: {}\n\
             - CORS Origins: {}\n\
             - OTP Max Attempts: {}\n\
             - OTP Codes In Responses: {}\n\
             - Subscription Sweep: {}\n\
             - SMS Gateway: {}",
            self.environment,
            self.bind_address(),
            self.log_level,
            if self.database.url.is_memory() {
                "SQLite (in-memory)"
            } else {
                "SQLite"
            },
            self.security.cors_origins.join(", "),
            self.otp.max_attempts,
            if self.otp.expose_codes {
                "Enabled"
            } else {
                "Disabled"
            },
            if self.subscription.sweep_interval_secs == 0 {
                "Disabled".to_owned()
            } else {
                format!("every {}s", self.subscription.sweep_interval_secs)
            },
            if self.sms.textbee.is_some() {
                "TextBee"
            } else {
                "Log only"
            },
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw}")),
        Err(_) => Ok(default),
    }
}

fn textbee_from_env() -> Option<TextBeeConfig> {
    let device_id = env::var("TEXTBEE_DEVICE_ID").ok().filter(|v| !v.is_empty())?;
    let api_key = env::var("TEXTBEE_API_KEY").ok().filter(|v| !v.is_empty())?;
    Some(TextBeeConfig {
        base_url: env_var_or("TEXTBEE_BASE_URL", defaults::TEXTBEE_BASE_URL),
        device_id,
        api_key,
    })
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
