// ABOUTME: Database operations for the append-only conversation message log
// ABOUTME: Inserts on a caller's transaction, chronological listing, paging and read receipts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::{decode_timestamp, encode_timestamp, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{Message, MessagePayload, MessageType, UserType};
use anyhow::Result;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, sender_type, message_type, content, metadata, is_read, created_at";

fn parse_message_type(raw: &str) -> AppResult<MessageType> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned()))
        .map_err(|e| AppError::database(format!("Unknown stored message type '{raw}': {e}")))
}

fn row_to_message(row: &SqliteRow) -> AppResult<Message> {
    let sender_type: String = row.get("sender_type");
    let message_type: String = row.get("message_type");
    let metadata: Option<String> = row.get("metadata");
    let created_at: String = row.get("created_at");

    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        sender_type: sender_type.parse()?,
        payload: MessagePayload::from_stored(
            parse_message_type(&message_type)?,
            metadata.as_deref(),
        )?,
        content: row.get("content"),
        is_read: row.get::<i64, _>("is_read") != 0,
        created_at: decode_timestamp(&created_at)?,
    })
}

impl Database {
    /// Create the message table
    pub(super) async fn migrate_messages(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
                sender_id INTEGER NOT NULL,
                sender_type TEXT NOT NULL CHECK (sender_type IN ('service_provider', 'consumer')),
                message_type TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, created_at, id)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Get a message by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_message(&self, id: i64) -> AppResult<Option<Message>> {
        sqlx::query(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?
            .map(|row| row_to_message(&row))
            .transpose()
    }

    /// All messages of a conversation in send order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_messages(&self, conversation_id: i64) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to list messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    /// A window of messages counted back from the newest, returned in send order
    ///
    /// `offset = 0` yields the most recent `limit` messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn page_messages(
        &self,
        conversation_id: i64,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                 SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT $2 OFFSET $3
             ) ORDER BY created_at ASC, id ASC"
        ))
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to page messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    /// Number of messages in a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn count_messages(&self, conversation_id: i64) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::database(format!("Failed to count messages: {e}")))
    }

    /// Unread messages in a conversation that were not sent by the reader
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn count_unread_messages(
        &self,
        conversation_id: i64,
        reader_id: i64,
        reader_type: UserType,
    ) -> AppResult<i64> {
        sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM messages
            WHERE conversation_id = $1 AND is_read = 0
              AND NOT (sender_id = $2 AND sender_type = $3)
            ",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .bind(reader_type.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to count unread messages: {e}")))
    }

    /// The newest message of a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn latest_message(&self, conversation_id: i64) -> AppResult<Option<Message>> {
        sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(conversation_id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to get latest message: {e}")))?
        .map(|row| row_to_message(&row))
        .transpose()
    }

    /// Flag as read every unread message in the conversation not sent by the reader
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn mark_messages_read(
        &self,
        conversation_id: i64,
        reader_id: i64,
        reader_type: UserType,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r"
            UPDATE messages SET is_read = 1
            WHERE conversation_id = $1 AND is_read = 0
              AND NOT (sender_id = $2 AND sender_type = $3)
            ",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .bind(reader_type.as_str())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to mark messages read: {e}")))?;

        Ok(result.rows_affected())
    }
}

/// Append a message to a conversation's log
///
/// # Errors
///
/// Returns an error if the metadata cannot be encoded or the insert fails
pub async fn insert_message(
    conn: &mut SqliteConnection,
    conversation_id: i64,
    sender_id: i64,
    sender_type: UserType,
    payload: MessagePayload,
    content: String,
    created_at: DateTime<Utc>,
) -> AppResult<Message> {
    let metadata = payload.metadata_json()?;
    let created_at = created_at.trunc_subsecs(6);

    let result = sqlx::query(
        r"
        INSERT INTO messages (conversation_id, sender_id, sender_type, message_type, content, metadata, is_read, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, 0, $7)
        ",
    )
    .bind(conversation_id)
    .bind(sender_id)
    .bind(sender_type.as_str())
    .bind(payload.message_type().as_str())
    .bind(&content)
    .bind(metadata)
    .bind(encode_timestamp(created_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to store message: {e}")))?;

    Ok(Message {
        id: result.last_insert_rowid(),
        conversation_id,
        sender_id,
        sender_type,
        payload,
        content,
        is_read: false,
        created_at,
    })
}
