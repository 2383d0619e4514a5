// ABOUTME: Database operations for provider and consumer conversations
// ABOUTME: Idempotent pair creation, status updates, per-user listing and last-message touch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::{decode_optional_timestamp, decode_timestamp, encode_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Conversation, ConversationStatus, UserType};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

const CONVERSATION_COLUMNS: &str =
    "id, provider_id, consumer_id, status, last_message_at, created_at, updated_at";

fn row_to_conversation(row: &SqliteRow) -> AppResult<Conversation> {
    let status: String = row.get("status");
    let last_message_at: Option<String> = row.get("last_message_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Conversation {
        id: row.get("id"),
        provider_id: row.get("provider_id"),
        consumer_id: row.get("consumer_id"),
        status: status.parse()?,
        last_message_at: decode_optional_timestamp(last_message_at.as_deref())?,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

impl Database {
    /// Create the conversation table
    pub(super) async fn migrate_conversations(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider_id INTEGER NOT NULL REFERENCES service_providers(id),
                consumer_id INTEGER NOT NULL REFERENCES consumers(id),
                status TEXT NOT NULL DEFAULT 'ACTIVE'
                    CHECK (status IN ('ACTIVE', 'COMPLETED', 'CANCELLED')),
                last_message_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(provider_id, consumer_id)
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_consumer ON conversations(consumer_id)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Insert the conversation for this pair unless it exists; returns whether a row was created
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn insert_conversation_if_absent(
        &self,
        provider_id: i64,
        consumer_id: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO conversations (provider_id, consumer_id, status, created_at, updated_at)
            VALUES ($1, $2, 'ACTIVE', $3, $3)
            ON CONFLICT(provider_id, consumer_id) DO NOTHING
            ",
        )
        .bind(provider_id)
        .bind(consumer_id)
        .bind(encode_timestamp(Utc::now()))
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the conversation for a provider and consumer pair
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_conversation_by_pair(
        &self,
        provider_id: i64,
        consumer_id: i64,
    ) -> AppResult<Option<Conversation>> {
        sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE provider_id = $1 AND consumer_id = $2"
        ))
        .bind(provider_id)
        .bind(consumer_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?
        .map(|row| row_to_conversation(&row))
        .transpose()
    }

    /// Get a conversation by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_conversation(&self, id: i64) -> AppResult<Option<Conversation>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| AppError::database(format!("Failed to acquire connection: {e}")))?;
        get_conversation_in(&mut conn, id).await
    }

    /// Move a conversation from `from` to `to`
    ///
    /// Returns `None` when the row is missing or no longer in `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn transition_conversation_status(
        &self,
        id: i64,
        from: ConversationStatus,
        to: ConversationStatus,
    ) -> AppResult<Option<Conversation>> {
        let result = sqlx::query(
            "UPDATE conversations SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(to.as_str())
        .bind(encode_timestamp(Utc::now()))
        .bind(from.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation status: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_conversation(id).await
    }

    /// Conversations a user takes part in, most recently active first
    ///
    /// Conversations without messages sort after all others, then by creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_conversations_for_user(
        &self,
        user_id: i64,
        user_type: UserType,
    ) -> AppResult<Vec<Conversation>> {
        let column = match user_type {
            UserType::ServiceProvider => "provider_id",
            UserType::Consumer => "consumer_id",
        };

        let rows = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE {column} = $1
             ORDER BY last_message_at IS NULL, last_message_at DESC, created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        rows.iter().map(row_to_conversation).collect()
    }
}

/// Get a conversation by ID on an existing connection
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn get_conversation_in(
    conn: &mut SqliteConnection,
    id: i64,
) -> AppResult<Option<Conversation>> {
    sqlx::query(&format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?
    .map(|row| row_to_conversation(&row))
    .transpose()
}

/// Record that a message was just posted
///
/// # Errors
///
/// Returns an error if the database operation fails
pub async fn touch_last_message(
    conn: &mut SqliteConnection,
    id: i64,
    at: DateTime<Utc>,
) -> AppResult<()> {
    let at = encode_timestamp(at);
    sqlx::query("UPDATE conversations SET last_message_at = $2, updated_at = $2 WHERE id = $1")
        .bind(id)
        .bind(&at)
        .execute(&mut *conn)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation: {e}")))?;
    Ok(())
}
