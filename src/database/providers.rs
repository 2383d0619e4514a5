// ABOUTME: Database operations for service provider accounts and their subscription columns
// ABOUTME: Covers create, lookup by contact, filtering, grouping statistics and expiry sweeps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::{decode_optional_timestamp, decode_timestamp, encode_timestamp, Database};
use crate::constants::otp::TRAILING_MATCH_DIGITS;
use crate::errors::{AppError, AppResult};
use crate::models::{Provider, SubscriptionStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

const PROVIDER_COLUMNS: &str = "id, name, city, skillset, description, experience, contact_no, \
     contact_digits, pin_hash, is_active, status, subscription_start_date, \
     subscription_end_date, created_at, updated_at";

/// Fields required to insert a provider
#[derive(Debug, Clone)]
pub struct NewProvider {
    /// Display name
    pub name: String,
    /// City of operation
    pub city: String,
    /// Skills description
    pub skillset: String,
    /// Optional profile description
    pub description: Option<String>,
    /// Optional experience summary
    pub experience: Option<String>,
    /// Contact number as entered, trimmed
    pub contact_no: String,
    /// Digits of the contact number
    pub contact_digits: String,
    /// bcrypt hash of the PIN
    pub pin_hash: Option<String>,
    /// Start of the signup grant
    pub subscription_start_date: DateTime<Utc>,
    /// End of the signup grant
    pub subscription_end_date: DateTime<Utc>,
}

/// Profile changes; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    /// New display name
    pub name: Option<String>,
    /// New city
    pub city: Option<String>,
    /// New skills description
    pub skillset: Option<String>,
    /// New profile description
    pub description: Option<String>,
    /// New experience summary
    pub experience: Option<String>,
    /// New contact number and its digits
    pub contact: Option<(String, String)>,
    /// New PIN hash
    pub pin_hash: Option<String>,
}

/// Search criteria for active providers
#[derive(Debug, Clone, Default)]
pub struct ProviderFilter {
    /// Case-insensitive substring of the city
    pub city: Option<String>,
    /// Case-insensitive substring of the skillset
    pub skillset: Option<String>,
    /// Exact experience value
    pub experience: Option<String>,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    /// Case-insensitive substring of name, city or skillset
    pub search: Option<String>,
}

/// Column used for grouped provider counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderGroupBy {
    /// Group by city
    City,
    /// Group by skillset
    Skillset,
}

impl ProviderGroupBy {
    const fn column(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Skillset => "skillset",
        }
    }
}

fn row_to_provider(row: &SqliteRow) -> AppResult<Provider> {
    let start: Option<String> = row.get("subscription_start_date");
    let end: Option<String> = row.get("subscription_end_date");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Provider {
        id: row.get("id"),
        name: row.get("name"),
        city: row.get("city"),
        skillset: row.get("skillset"),
        description: row.get("description"),
        experience: row.get("experience"),
        contact_no: row.get("contact_no"),
        contact_digits: row.get("contact_digits"),
        pin_hash: row.get("pin_hash"),
        is_active: row.get::<i64, _>("is_active") != 0,
        status: SubscriptionStatus::from_db(row.get("status")),
        subscription_start_date: decode_optional_timestamp(start.as_deref())?,
        subscription_end_date: decode_optional_timestamp(end.as_deref())?,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

fn trailing_digits(digits: &str) -> Option<&str> {
    (digits.len() >= TRAILING_MATCH_DIGITS).then(|| &digits[digits.len() - TRAILING_MATCH_DIGITS..])
}

impl Database {
    /// Create the provider table
    pub(super) async fn migrate_providers(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS service_providers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                city TEXT NOT NULL,
                skillset TEXT NOT NULL,
                description TEXT,
                experience TEXT,
                contact_no TEXT NOT NULL,
                contact_digits TEXT NOT NULL,
                pin_hash TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                status INTEGER NOT NULL DEFAULT 1,
                subscription_start_date TEXT,
                subscription_end_date TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_service_providers_contact ON service_providers(contact_digits)",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_service_providers_subscription ON service_providers(is_active, status, subscription_end_date)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Insert a provider
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_provider(&self, new: &NewProvider) -> AppResult<Provider> {
        let now = encode_timestamp(Utc::now());

        let result = sqlx::query(
            r"
            INSERT INTO service_providers (
                name, city, skillset, description, experience, contact_no, contact_digits,
                pin_hash, is_active, status, subscription_start_date, subscription_end_date,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, 1, $9, $10, $11, $11)
            ",
        )
        .bind(&new.name)
        .bind(&new.city)
        .bind(&new.skillset)
        .bind(&new.description)
        .bind(&new.experience)
        .bind(&new.contact_no)
        .bind(&new.contact_digits)
        .bind(&new.pin_hash)
        .bind(encode_timestamp(new.subscription_start_date))
        .bind(encode_timestamp(new.subscription_end_date))
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create service provider: {e}")))?;

        self.get_provider(result.last_insert_rowid())
            .await?
            .ok_or_else(|| AppError::internal("Service provider vanished after insert"))
    }

    /// Get a provider by ID, including soft-deleted ones
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_provider(&self, id: i64) -> AppResult<Option<Provider>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        get_provider_in(&mut conn, id).await
    }

    /// Get a provider by ID if it has not been soft-deleted
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_active_provider(&self, id: i64) -> AppResult<Option<Provider>> {
        Ok(self.get_provider(id).await?.filter(|p| p.is_active))
    }

    /// All active providers, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_active_providers(&self) -> AppResult<Vec<Provider>> {
        self.filter_providers(&ProviderFilter::default()).await
    }

    /// Find an active provider whose contact matches the given digits exactly
    /// or on the trailing seven digits
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn find_active_provider_by_contact(&self, digits: &str) -> AppResult<Option<Provider>> {
        let exact = sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM service_providers
             WHERE is_active = 1 AND contact_digits = $1
             ORDER BY id LIMIT 1"
        ))
        .bind(digits)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to look up service provider: {e}")))?;

        if let Some(row) = exact {
            return row_to_provider(&row).map(Some);
        }

        let Some(suffix) = trailing_digits(digits) else {
            return Ok(None);
        };

        sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM service_providers
             WHERE is_active = 1 AND length(contact_digits) >= {TRAILING_MATCH_DIGITS}
               AND substr(contact_digits, -{TRAILING_MATCH_DIGITS}) = $1
             ORDER BY id LIMIT 1"
        ))
        .bind(suffix)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to look up service provider: {e}")))?
        .map(|row| row_to_provider(&row))
        .transpose()
    }

    /// Whether an active provider other than `exclude_id` already uses these contact digits
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn provider_contact_in_use(
        &self,
        digits: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM service_providers
            WHERE is_active = 1 AND contact_digits = $1 AND id != $2
            ",
        )
        .bind(digits)
        .bind(exclude_id.unwrap_or(-1))
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to check contact number: {e}")))?;

        Ok(count > 0)
    }

    /// Apply profile changes to an active provider
    ///
    /// Returns `None` when no active provider has this ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn update_provider(
        &self,
        id: i64,
        update: &ProviderUpdate,
    ) -> AppResult<Option<Provider>> {
        let (contact_no, contact_digits) = update
            .contact
            .as_ref()
            .map_or((None, None), |(no, digits)| (Some(no), Some(digits)));

        let result = sqlx::query(
            r"
            UPDATE service_providers SET
                name = COALESCE($2, name),
                city = COALESCE($3, city),
                skillset = COALESCE($4, skillset),
                description = COALESCE($5, description),
                experience = COALESCE($6, experience),
                contact_no = COALESCE($7, contact_no),
                contact_digits = COALESCE($8, contact_digits),
                pin_hash = COALESCE($9, pin_hash),
                updated_at = $10
            WHERE id = $1 AND is_active = 1
            ",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.city)
        .bind(&update.skillset)
        .bind(&update.description)
        .bind(&update.experience)
        .bind(contact_no)
        .bind(contact_digits)
        .bind(&update.pin_hash)
        .bind(encode_timestamp(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update service provider: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_provider(id).await
    }

    /// Soft-delete a provider; returns false when it was not active
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn deactivate_provider(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE service_providers SET is_active = 0, updated_at = $2 WHERE id = $1 AND is_active = 1",
        )
        .bind(id)
        .bind(encode_timestamp(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to delete service provider: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Active providers matching every given criterion, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn filter_providers(&self, filter: &ProviderFilter) -> AppResult<Vec<Provider>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {PROVIDER_COLUMNS} FROM service_providers WHERE is_active = 1"
        ));

        for (column, value) in [
            ("city", &filter.city),
            ("skillset", &filter.skillset),
            ("name", &filter.name),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                builder
                    .push(format!(" AND instr(LOWER({column}), LOWER("))
                    .push_bind(value.to_owned())
                    .push(")) > 0");
            }
        }

        if let Some(experience) = filter.experience.as_deref().filter(|v| !v.is_empty()) {
            builder.push(" AND experience = ").push_bind(experience.to_owned());
        }

        if let Some(search) = filter.search.as_deref().filter(|v| !v.is_empty()) {
            builder.push(" AND (");
            for (i, column) in ["name", "city", "skillset"].into_iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push(format!("instr(LOWER({column}), LOWER("))
                    .push_bind(search.to_owned())
                    .push(")) > 0");
            }
            builder.push(")");
        }

        builder.push(" ORDER BY created_at DESC, id DESC");

        let rows = builder
            .build()
            .fetch_all(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to filter service providers: {e}")))?;

        rows.iter().map(row_to_provider).collect()
    }

    /// Number of active providers
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn count_active_providers(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM service_providers WHERE is_active = 1")
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to count service providers: {e}")))
    }

    /// Active provider counts grouped by a column, largest group first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn count_providers_grouped(
        &self,
        group_by: ProviderGroupBy,
    ) -> AppResult<Vec<(String, i64)>> {
        let column = group_by.column();
        let rows = sqlx::query(&format!(
            "SELECT {column} AS group_value, COUNT(*) AS total FROM service_providers
             WHERE is_active = 1 GROUP BY {column} ORDER BY total DESC, {column} ASC"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to group service providers: {e}")))?;

        Ok(rows
            .iter()
            .map(|row| (row.get("group_value"), row.get("total")))
            .collect())
    }

    /// Distinct cities with at least one active provider, alphabetically
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn distinct_provider_cities(&self) -> AppResult<Vec<String>> {
        sqlx::query_scalar(
            "SELECT DISTINCT city FROM service_providers WHERE is_active = 1 ORDER BY city ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list cities: {e}")))
    }

    /// Flip every active, lapsed subscription to expired; returns the rows changed
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn expire_lapsed_providers(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let now = encode_timestamp(now);
        let result = sqlx::query(
            r"
            UPDATE service_providers SET status = 0, updated_at = $1
            WHERE is_active = 1 AND status = 1
              AND subscription_end_date IS NOT NULL AND subscription_end_date < $1
            ",
        )
        .bind(&now)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to expire subscriptions: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Active providers that are expired or past their end date, earliest end first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_lapsed_providers(&self, now: DateTime<Utc>) -> AppResult<Vec<Provider>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM service_providers
             WHERE is_active = 1
               AND (status = 0 OR (subscription_end_date IS NOT NULL AND subscription_end_date < $1))
             ORDER BY subscription_end_date IS NULL, subscription_end_date ASC, id ASC"
        ))
        .bind(encode_timestamp(now))
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list lapsed subscriptions: {e}")))?;

        rows.iter().map(row_to_provider).collect()
    }
}

/// Get a provider by ID on an existing connection
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn get_provider_in(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Provider>> {
    sqlx::query(&format!(
        "SELECT {PROVIDER_COLUMNS} FROM service_providers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to get service provider: {e}")))?
    .map(|row| row_to_provider(&row))
    .transpose()
}

/// Write a new subscription period; returns false when no active provider has this ID
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn set_subscription(
    conn: &mut SqliteConnection,
    id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AppResult<bool> {
    let result = sqlx::query(
        r"
        UPDATE service_providers SET
            status = 1,
            subscription_start_date = $2,
            subscription_end_date = $3,
            updated_at = $2
        WHERE id = $1 AND is_active = 1
        ",
    )
    .bind(id)
    .bind(encode_timestamp(start))
    .bind(encode_timestamp(end))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to renew subscription: {e}")))?;

    Ok(result.rows_affected() > 0)
}

/// Replace a provider's PIN hash
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn update_provider_pin(
    conn: &mut SqliteConnection,
    id: i64,
    pin_hash: &str,
) -> AppResult<()> {
    sqlx::query("UPDATE service_providers SET pin_hash = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(pin_hash)
        .bind(encode_timestamp(Utc::now()))
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to update PIN: {e}")))?;
    Ok(())
}
