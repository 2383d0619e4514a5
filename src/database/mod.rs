// ABOUTME: SQLite persistence for accounts, OTP codes, conversations, messages and payments
// ABOUTME: Owns the connection pool, schema migrations and timestamp encoding helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # Database Management
//!
//! A single [`Database`] wraps the `SQLite` pool. Entity operations are split
//! across submodules, each adding its own `impl Database` block and schema
//! migration. Operations that must share a transaction are exposed as free
//! functions taking a `&mut SqliteConnection`, so callers can pass `&mut *tx`.
//!
//! Timestamps are stored as RFC 3339 text with a fixed microsecond precision
//! and a `Z` suffix, which keeps lexicographic and chronological order equal.

/// Consumer accounts
pub mod consumers;
/// Conversations between a provider and a consumer
pub mod conversations;
/// Conversation message log
pub mod messages;
/// One-time passcodes
pub mod otp_codes;
/// Subscription payment ledger
pub mod payments;
/// Service provider accounts
pub mod providers;

pub use providers::{ProviderFilter, ProviderGroupBy, ProviderUpdate};

use crate::config::DatabaseUrl;
use crate::errors::{AppError, AppResult};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::info;

/// Database manager for all marketplace storage
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or a
    /// migration fails
    pub async fn new(url: &DatabaseUrl) -> Result<Self> {
        let pool = match url {
            DatabaseUrl::Memory => {
                // Every connection to :memory: is a separate database, so the
                // pool is pinned to one connection that is never recycled
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(
                        SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true),
                    )
                    .await
                    .context("Failed to open in-memory database")?
            }
            DatabaseUrl::SQLite { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .foreign_keys(true);
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .with_context(|| format!("Failed to open database {}", path.display()))?
            }
        };

        let db = Self { pool };
        db.migrate().await?;

        info!("Database ready at {url}");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction
    ///
    /// # Errors
    ///
    /// Returns an error if no connection is available
    pub async fn begin(&self) -> AppResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if any table or index cannot be created
    pub async fn migrate(&self) -> Result<()> {
        self.migrate_providers().await?;
        self.migrate_consumers().await?;
        self.migrate_otp_codes().await?;
        self.migrate_conversations().await?;
        self.migrate_messages().await?;
        self.migrate_payments().await?;
        Ok(())
    }
}

/// Encode a timestamp for storage
#[must_use]
pub fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp
///
/// # Errors
///
/// Returns a database error if the text is not RFC 3339
pub fn decode_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid stored timestamp '{value}': {e}")))
}

/// Decode an optional stored timestamp
///
/// # Errors
///
/// Returns a database error if the text is present but not RFC 3339
pub fn decode_optional_timestamp(value: Option<&str>) -> AppResult<Option<DateTime<Utc>>> {
    value.map(decode_timestamp).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_encoding_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();

        let a = encode_timestamp(earlier);
        let b = encode_timestamp(later);
        assert!(a < b);
        assert!(a.ends_with('Z'));
        assert_eq!(decode_timestamp(&a).unwrap(), earlier);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_timestamp("yesterday").is_err());
        assert!(decode_optional_timestamp(None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_database_migrates() {
        let db = Database::new(&DatabaseUrl::Memory).await.unwrap();
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();

        for expected in [
            "consumers",
            "conversations",
            "messages",
            "otp_codes",
            "provider_payments",
            "service_providers",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("hojaega.db");
        let url = DatabaseUrl::SQLite { path: path.clone() };

        let db = Database::new(&url).await.unwrap();
        sqlx::query("INSERT INTO consumers (name, city, pin_hash, created_at, updated_at) VALUES ($1, $2, $3, $4, $4)")
            .bind("Sara Khan")
            .bind("Lahore")
            .bind("hash")
            .bind(encode_timestamp(Utc::now()))
            .execute(db.pool())
            .await
            .unwrap();
        db.pool().close().await;
        assert!(path.exists());

        let reopened = Database::new(&url).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM consumers")
            .fetch_one(reopened.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
