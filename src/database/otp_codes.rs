// ABOUTME: Database operations for one-time passcodes
// ABOUTME: Supersede, insert, attempt counting and guarded consumption run on a caller's transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::{decode_optional_timestamp, decode_timestamp, encode_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{OtpCode, OtpPurpose};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

const OTP_COLUMNS: &str =
    "id, contact_no, purpose, code_hash, attempts, created_at, expires_at, consumed_at, superseded_at";

fn row_to_otp(row: &SqliteRow) -> AppResult<OtpCode> {
    let purpose: String = row.get("purpose");
    let created_at: String = row.get("created_at");
    let expires_at: String = row.get("expires_at");
    let consumed_at: Option<String> = row.get("consumed_at");
    let superseded_at: Option<String> = row.get("superseded_at");

    Ok(OtpCode {
        id: row.get("id"),
        contact_no: row.get("contact_no"),
        purpose: purpose.parse()?,
        code_hash: row.get("code_hash"),
        attempts: u32::try_from(row.get::<i64, _>("attempts")).unwrap_or(u32::MAX),
        created_at: decode_timestamp(&created_at)?,
        expires_at: decode_timestamp(&expires_at)?,
        consumed_at: decode_optional_timestamp(consumed_at.as_deref())?,
        superseded_at: decode_optional_timestamp(superseded_at.as_deref())?,
    })
}

impl Database {
    /// Create the OTP table
    pub(super) async fn migrate_otp_codes(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS otp_codes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_no TEXT NOT NULL,
                purpose TEXT NOT NULL,
                code_hash TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                consumed_at TEXT,
                superseded_at TEXT
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_otp_codes_scope ON otp_codes(contact_no, purpose, created_at)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get an OTP record by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_otp_code(&self, id: i64) -> AppResult<Option<OtpCode>> {
        sqlx::query(&format!("SELECT {OTP_COLUMNS} FROM otp_codes WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get OTP code: {e}")))?
            .map(|row| row_to_otp(&row))
            .transpose()
    }

    /// Delete codes that were consumed, superseded or expired before `cutoff`
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn purge_otp_codes(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            DELETE FROM otp_codes
            WHERE expires_at < $1
               OR (consumed_at IS NOT NULL AND consumed_at < $1)
               OR (superseded_at IS NOT NULL AND superseded_at < $1)
            ",
        )
        .bind(encode_timestamp(cutoff))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to purge OTP codes: {e}")))?;

        Ok(result.rows_affected())
    }
}

/// Mark every live code for this scope as superseded
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn supersede_live(
    conn: &mut SqliteConnection,
    contact_no: &str,
    purpose: OtpPurpose,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let result = sqlx::query(
        r"
        UPDATE otp_codes SET superseded_at = $3
        WHERE contact_no = $1 AND purpose = $2
          AND consumed_at IS NULL AND superseded_at IS NULL
        ",
    )
    .bind(contact_no)
    .bind(purpose.as_str())
    .bind(encode_timestamp(now))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to supersede OTP codes: {e}")))?;

    Ok(result.rows_affected())
}

/// Insert a freshly issued code; returns its ID
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn insert_code(
    conn: &mut SqliteConnection,
    contact_no: &str,
    purpose: OtpPurpose,
    code_hash: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> AppResult<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO otp_codes (contact_no, purpose, code_hash, attempts, created_at, expires_at)
        VALUES ($1, $2, $3, 0, $4, $5)
        ",
    )
    .bind(contact_no)
    .bind(purpose.as_str())
    .bind(code_hash)
    .bind(encode_timestamp(created_at))
    .bind(encode_timestamp(expires_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to store OTP code: {e}")))?;

    Ok(result.last_insert_rowid())
}

/// The newest code for this scope that is neither consumed nor superseded
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn latest_live(
    conn: &mut SqliteConnection,
    contact_no: &str,
    purpose: OtpPurpose,
) -> AppResult<Option<OtpCode>> {
    sqlx::query(&format!(
        "SELECT {OTP_COLUMNS} FROM otp_codes
         WHERE contact_no = $1 AND purpose = $2
           AND consumed_at IS NULL AND superseded_at IS NULL
         ORDER BY created_at DESC, id DESC LIMIT 1"
    ))
    .bind(contact_no)
    .bind(purpose.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to look up OTP code: {e}")))?
    .map(|row| row_to_otp(&row))
    .transpose()
}

/// The most recently superseded, never consumed codes for this scope
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn recently_superseded(
    conn: &mut SqliteConnection,
    contact_no: &str,
    purpose: OtpPurpose,
    limit: i64,
) -> AppResult<Vec<OtpCode>> {
    let rows = sqlx::query(&format!(
        "SELECT {OTP_COLUMNS} FROM otp_codes
         WHERE contact_no = $1 AND purpose = $2
           AND consumed_at IS NULL AND superseded_at IS NOT NULL
         ORDER BY superseded_at DESC, id DESC LIMIT $3"
    ))
    .bind(contact_no)
    .bind(purpose.as_str())
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to look up OTP codes: {e}")))?;

    rows.iter().map(row_to_otp).collect()
}

/// Count a failed verification against a code
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn record_failed_attempt(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
    sqlx::query("UPDATE otp_codes SET attempts = attempts + 1 WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to record OTP attempt: {e}")))?;
    Ok(())
}

/// Consume a live code; returns false if another verification got there first
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn consume(conn: &mut SqliteConnection, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
    let result = sqlx::query(
        r"
        UPDATE otp_codes SET consumed_at = $2, attempts = attempts + 1
        WHERE id = $1 AND consumed_at IS NULL AND superseded_at IS NULL
        ",
    )
    .bind(id)
    .bind(encode_timestamp(now))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to consume OTP code: {e}")))?;

    Ok(result.rows_affected() == 1)
}
