// ABOUTME: Conversation lifecycle between one provider and one consumer, plus message listing and read tracking
// ABOUTME: Enforces the ACTIVE -> COMPLETED | CANCELLED state machine with terminal end states
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::constants::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{
    ConsumerSummary, Conversation, ConversationStatus, Message, ProviderSummary, UserType,
};
use serde::Serialize;
use std::sync::Arc;

/// Page position of a conversation's message window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Messages in the whole conversation
    pub total_messages: i64,
    /// One-based page number, counted back from the newest message
    pub page: i64,
    /// Page size
    pub limit: i64,
    /// Number of pages at this size
    pub pages: i64,
}

impl Pagination {
    fn new(total_messages: i64, page: i64, limit: i64) -> Self {
        Self {
            total_messages,
            page,
            limit,
            pages: total_messages.saturating_add(limit - 1) / limit,
        }
    }

    /// Rows to skip; saturates so absurd page numbers yield an empty page
    const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// A conversation with its participants and optionally one page of messages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetails {
    /// Conversation record
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Provider participant, absent if the row vanished
    pub service_provider: Option<ProviderSummary>,
    /// Consumer participant, absent if the row vanished
    pub consumer: Option<ConsumerSummary>,
    /// Requested page in send order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    /// Position of the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// One row of a user's conversation list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListItem {
    /// Conversation record
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Provider participant
    pub service_provider: Option<ProviderSummary>,
    /// Consumer participant
    pub consumer: Option<ConsumerSummary>,
    /// Newest message when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// Messages from the other participant not yet read
    pub unread_count: i64,
}

/// Clamp user-supplied page and limit to sane values
#[must_use]
pub fn page_bounds(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

/// Conversation state machine and message queries
pub struct ConversationService {
    database: Arc<Database>,
}

impl ConversationService {
    /// Create the service
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Open the conversation for a pair, or return the one that already exists
    ///
    /// The flag is `true` when this call created the row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when either participant does not exist, or a database error
    pub async fn create_conversation(
        &self,
        provider_id: i64,
        consumer_id: i64,
    ) -> AppResult<(Conversation, bool)> {
        // Soft-deleted providers still own their history
        if self.database.get_provider(provider_id).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Service provider with ID {provider_id}"
            )));
        }
        if self.database.get_consumer(consumer_id).await?.is_none() {
            return Err(AppError::not_found(format!("Consumer with ID {consumer_id}")));
        }

        let created = self
            .database
            .insert_conversation_if_absent(provider_id, consumer_id)
            .await?;
        let conversation = self
            .database
            .get_conversation_by_pair(provider_id, consumer_id)
            .await?
            .ok_or_else(|| AppError::internal("Conversation vanished after insert"))?;

        if created {
            AppLogger::log_conversation_event(
                conversation.id,
                "created",
                &format!("provider={provider_id} consumer={consumer_id}"),
            );
        }
        Ok((conversation, created))
    }

    /// Move a conversation to a new status
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when absent, `InvalidStateTransition` when the
    /// conversation is already closed, or a database error
    pub async fn update_status(
        &self,
        id: i64,
        status: ConversationStatus,
    ) -> AppResult<Conversation> {
        let current = self.require(id).await?;

        if current.status.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "Conversation is {} and cannot change to {status}",
                current.status
            )));
        }
        if current.status == status {
            return Ok(current);
        }

        let Some(updated) = self
            .database
            .transition_conversation_status(id, current.status, status)
            .await?
        else {
            // Lost a race with another transition
            let latest = self.require(id).await?;
            return Err(AppError::invalid_transition(format!(
                "Conversation is {} and cannot change to {status}",
                latest.status
            )));
        };
        AppLogger::log_conversation_event(
            id,
            "status_changed",
            &format!("{} -> {status}", current.status),
        );
        Ok(updated)
    }

    /// A conversation with participant summaries and optionally one page of messages
    ///
    /// Page 1 holds the newest `limit` messages, returned oldest first.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when absent, or a database error
    pub async fn get_conversation(
        &self,
        id: i64,
        include_messages: bool,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> AppResult<ConversationDetails> {
        let conversation = self.require(id).await?;
        let (service_provider, consumer) = self.participants(&conversation).await?;

        let (messages, pagination) = if include_messages {
            let (page, limit) = page_bounds(page, limit);
            let pagination = Pagination::new(self.database.count_messages(id).await?, page, limit);
            let messages = self
                .database
                .page_messages(id, pagination.limit, pagination.offset())
                .await?;
            (Some(messages), Some(pagination))
        } else {
            (None, None)
        };

        Ok(ConversationDetails {
            conversation,
            service_provider,
            consumer,
            messages,
            pagination,
        })
    }

    /// Every conversation a user takes part in, most recently active first
    ///
    /// # Errors
    ///
    /// Returns a database error
    pub async fn list_for_user(
        &self,
        user_id: i64,
        user_type: UserType,
        include_last_message: bool,
    ) -> AppResult<Vec<ConversationListItem>> {
        let conversations = self
            .database
            .list_conversations_for_user(user_id, user_type)
            .await?;

        let mut items = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let (service_provider, consumer) = self.participants(&conversation).await?;
            let last_message = if include_last_message {
                self.database.latest_message(conversation.id).await?
            } else {
                None
            };
            let unread_count = self
                .database
                .count_unread_messages(conversation.id, user_id, user_type)
                .await?;

            items.push(ConversationListItem {
                conversation,
                service_provider,
                consumer,
                last_message,
                unread_count,
            });
        }
        Ok(items)
    }

    /// All messages of a conversation in send order
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the conversation is absent, or a database error
    pub async fn list_messages(&self, conversation_id: i64) -> AppResult<Vec<Message>> {
        self.require(conversation_id).await?;
        self.database.list_messages(conversation_id).await
    }

    /// A window of messages counted back from the newest
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the conversation is absent, or a database error
    pub async fn page_messages(
        &self,
        conversation_id: i64,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<Vec<Message>> {
        self.require(conversation_id).await?;
        let (_, limit) = page_bounds(None, limit);
        let offset = offset.unwrap_or(0).max(0);
        self.database
            .page_messages(conversation_id, limit, offset)
            .await
    }

    /// Mark as read everything the reader has not sent; returns how many flipped
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the conversation is absent, or a database error
    pub async fn mark_read(
        &self,
        conversation_id: i64,
        reader_id: i64,
        reader_type: UserType,
    ) -> AppResult<u64> {
        self.require(conversation_id).await?;
        self.database
            .mark_messages_read(conversation_id, reader_id, reader_type)
            .await
    }

    async fn require(&self, id: i64) -> AppResult<Conversation> {
        self.database
            .get_conversation(id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))
    }

    async fn participants(
        &self,
        conversation: &Conversation,
    ) -> AppResult<(Option<ProviderSummary>, Option<ConsumerSummary>)> {
        let provider = self
            .database
            .get_provider(conversation.provider_id)
            .await?
            .map(|p| p.summary());
        let consumer = self
            .database
            .get_consumer(conversation.consumer_id)
            .await?
            .map(|c| c.summary());
        Ok((provider, consumer))
    }
}
