// ABOUTME: Database operations for the provider subscription payment ledger
// ABOUTME: Append-only inserts on a caller's transaction plus per-provider listing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::{decode_timestamp, encode_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::ProviderPayment;
use anyhow::Result;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

fn row_to_payment(row: &SqliteRow) -> AppResult<ProviderPayment> {
    let created_at: String = row.get("created_at");

    Ok(ProviderPayment {
        id: row.get("id"),
        provider_id: row.get("provider_id"),
        amount: row.get("amount"),
        months: u32::try_from(row.get::<i64, _>("months")).unwrap_or_default(),
        proof_reference: row.get("proof_reference"),
        created_at: decode_timestamp(&created_at)?,
    })
}

impl Database {
    /// Create the payment ledger table
    pub(super) async fn migrate_payments(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS provider_payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id INTEGER NOT NULL REFERENCES service_providers(id),
                amount REAL,
                months INTEGER NOT NULL,
                proof_reference TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_provider_payments_provider ON provider_payments(provider_id, created_at)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Ledger entries for a provider, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_provider_payments(&self, provider_id: i64) -> AppResult<Vec<ProviderPayment>> {
        let rows = sqlx::query(
            r"
            SELECT id, provider_id, amount, months, proof_reference, created_at
            FROM provider_payments WHERE provider_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(provider_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list payments: {e}")))?;

        rows.iter().map(row_to_payment).collect()
    }
}

/// Append a payment proof to the ledger
///
/// # Errors
///
/// Returns an error if the insert fails
pub async fn insert_payment(
    conn: &mut SqliteConnection,
    provider_id: i64,
    amount: Option<f64>,
    months: u32,
    proof_reference: &str,
    created_at: DateTime<Utc>,
) -> AppResult<ProviderPayment> {
    let created_at = created_at.trunc_subsecs(6);
    let result = sqlx::query(
        r"
        INSERT INTO provider_payments (provider_id, amount, months, proof_reference, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(provider_id)
    .bind(amount)
    .bind(i64::from(months))
    .bind(proof_reference)
    .bind(encode_timestamp(created_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to record payment: {e}")))?;

    Ok(ProviderPayment {
        id: result.last_insert_rowid(),
        provider_id,
        amount,
        months,
        proof_reference: proof_reference.to_owned(),
        created_at,
    })
}
