// ABOUTME: Database operations for consumer accounts
// ABOUTME: Handles creation, lookup by ID, name and city, or contact digits, and PIN updates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::{decode_timestamp, encode_timestamp, Database};
use crate::constants::otp::TRAILING_MATCH_DIGITS;
use crate::errors::{AppError, AppResult};
use crate::models::Consumer;
use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

const CONSUMER_COLUMNS: &str =
    "id, name, city, contact_no, contact_digits, pin_hash, created_at, updated_at";

/// Fields required to insert a consumer
#[derive(Debug, Clone)]
pub struct NewConsumer {
    /// Display name, trimmed
    pub name: String,
    /// Home city, trimmed
    pub city: String,
    /// Optional contact number and its digits
    pub contact: Option<(String, String)>,
    /// bcrypt hash of the PIN
    pub pin_hash: String,
}

fn row_to_consumer(row: &SqliteRow) -> AppResult<Consumer> {
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Consumer {
        id: row.get("id"),
        name: row.get("name"),
        city: row.get("city"),
        contact_no: row.get("contact_no"),
        contact_digits: row.get("contact_digits"),
        pin_hash: row.get("pin_hash"),
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

impl Database {
    /// Create the consumer table
    pub(super) async fn migrate_consumers(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS consumers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                city TEXT NOT NULL,
                contact_no TEXT,
                contact_digits TEXT,
                pin_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(name, city)
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_consumers_contact ON consumers(contact_digits)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Insert a consumer
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the name and city pair is taken, or a database
    /// error if the insert fails
    pub async fn create_consumer(&self, new: &NewConsumer) -> AppResult<Consumer> {
        let now = encode_timestamp(Utc::now());
        let (contact_no, contact_digits) = new
            .contact
            .as_ref()
            .map_or((None, None), |(no, digits)| (Some(no), Some(digits)));

        let result = sqlx::query(
            r"
            INSERT INTO consumers (name, city, contact_no, contact_digits, pin_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ",
        )
        .bind(&new.name)
        .bind(&new.city)
        .bind(contact_no)
        .bind(contact_digits)
        .bind(&new.pin_hash)
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::conflict("A consumer with this name and city already exists")
            }
            other => AppError::database(format!("Failed to create consumer: {other}")),
        })?;

        self.get_consumer(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::internal("Consumer vanished after insert"))
    }

    /// Get a consumer by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_consumer(&self, id: i64) -> AppResult<Option<Consumer>> {
        sqlx::query(&format!("SELECT {CONSUMER_COLUMNS} FROM consumers WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get consumer: {e}")))?
            .map(|row| row_to_consumer(&row))
            .transpose()
    }

    /// Whether a consumer with this exact name and city exists
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn consumer_exists(&self, name: &str, city: &str) -> AppResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM consumers WHERE name = $1 AND city = $2")
                .bind(name)
                .bind(city)
                .fetch_one(self.pool())
                .await
                .map_err(|e| AppError::database(format!("Failed to check consumer: {e}")))?;
        Ok(count > 0)
    }

    /// Find a consumer by contact digits, exactly or on the trailing seven digits
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn find_consumer_by_contact(&self, digits: &str) -> AppResult<Option<Consumer>> {
        let exact = sqlx::query(&format!(
            "SELECT {CONSUMER_COLUMNS} FROM consumers WHERE contact_digits = $1 ORDER BY id LIMIT 1"
        ))
        .bind(digits)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to look up consumer: {e}")))?;

        if let Some(row) = exact {
            return row_to_consumer(&row).map(Some);
        }
        if digits.len() < TRAILING_MATCH_DIGITS {
            return Ok(None);
        }

        let suffix = &digits[digits.len() - TRAILING_MATCH_DIGITS..];
        sqlx::query(&format!(
            "SELECT {CONSUMER_COLUMNS} FROM consumers
             WHERE contact_digits IS NOT NULL
               AND length(contact_digits) >= {TRAILING_MATCH_DIGITS}
               AND substr(contact_digits, -{TRAILING_MATCH_DIGITS}) = $1
             ORDER BY id LIMIT 1"
        ))
        .bind(suffix)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to look up consumer: {e}")))?
        .map(|row| row_to_consumer(&row))
        .transpose()
    }
}

/// Replace a consumer's PIN hash
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn update_consumer_pin(
    conn: &mut SqliteConnection,
    id: i64,
    pin_hash: &str,
) -> AppResult<()> {
    sqlx::query("UPDATE consumers SET pin_hash = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(pin_hash)
        .bind(encode_timestamp(Utc::now()))
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to update PIN: {e}")))?;
    Ok(())
}
