// ABOUTME: Conversation route handlers: open, fetch, list, change status, mark read and page messages
// ABOUTME: Thin axum handlers that delegate to ConversationService and shape the JSON envelopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! Conversation routes
//!
//! `GET /api/conversation` serves two lookups: by `id`, or every
//! conversation of one account by `userType` and `userId`.

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::errors::{AppError, AppResult};
use crate::models::{ConversationStatus, UserType};
use crate::resources::ServerResources;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Body of `POST /api/conversation`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Provider participant
    pub service_provider_id: Option<i64>,
    /// Consumer participant
    pub consumer_id: Option<i64>,
}

/// Query of `GET /api/conversation`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    /// Fetch a single conversation
    pub id: Option<i64>,
    /// Include messages (a page when fetching by ID, the newest one when listing)
    pub include_messages: Option<bool>,
    /// Page number, 1 is the newest page
    pub page: Option<i64>,
    /// Page size
    pub limit: Option<i64>,
    /// List conversations of this account kind
    pub user_type: Option<String>,
    /// List conversations of this account
    pub user_id: Option<i64>,
}

/// Body of `PUT /api/conversation/:id/status`
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// `ACTIVE`, `COMPLETED` or `CANCELLED`
    pub status: String,
}

/// Body of `PUT /api/conversation/:id/read`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    /// Reader account
    pub user_id: Option<i64>,
    /// Reader kind
    pub user_type: Option<String>,
}

/// Query of `GET /api/messages`
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    /// Conversation ID
    pub id: Option<i64>,
}

/// Query of `GET /api/conversation/:id/messages`
#[derive(Debug, Default, Deserialize)]
pub struct MessageWindowQuery {
    /// Page size
    pub limit: Option<i64>,
    /// Messages to skip counting back from the newest
    pub offset: Option<i64>,
}

fn parse_user_type(raw: Option<&str>) -> AppResult<UserType> {
    raw.ok_or_else(|| AppError::missing_field("userType"))?.parse()
}

/// Conversation routes implementation
pub struct ConversationRoutes;

impl ConversationRoutes {
    /// Create all conversation routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/conversation",
                post(Self::create_conversation).get(Self::get_conversation),
            )
            .route(
                "/api/conversation/create",
                post(Self::create_conversation),
            )
            .route("/api/conversation/:id/status", put(Self::update_status))
            .route("/api/conversation/:id/read", put(Self::mark_read))
            .route("/api/conversation/:id/messages", get(Self::page_messages))
            .route(
                "/api/conversations/:user_type/:user_id",
                get(Self::list_for_user),
            )
            .route("/api/messages", get(Self::list_messages))
            .with_state(resources)
    }

    async fn create_conversation(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<CreateConversationRequest>,
    ) -> Result<Response, AppError> {
        let provider_id = request
            .service_provider_id
            .ok_or_else(|| AppError::missing_field("serviceProviderId"))?;
        let consumer_id = request
            .consumer_id
            .ok_or_else(|| AppError::missing_field("consumerId"))?;
        if provider_id <= 0 || consumer_id <= 0 {
            return Err(AppError::invalid_input(
                "serviceProviderId and consumerId must be positive integers",
            ));
        }

        let (conversation, created) = resources
            .conversations
            .create_conversation(provider_id, consumer_id)
            .await?;
        let details = resources
            .conversations
            .get_conversation(conversation.id, false, None, None)
            .await?;

        let status = if created {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        Ok((
            status,
            Json(json!({
                "success": true,
                "created": created,
                "conversation": details,
            })),
        )
            .into_response())
    }

    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        ApiQuery(query): ApiQuery<ConversationQuery>,
    ) -> Result<Response, AppError> {
        let include_messages = query.include_messages.unwrap_or(false);

        if let Some(id) = query.id {
            let details = resources
                .conversations
                .get_conversation(id, include_messages, query.page, query.limit)
                .await?;
            return Ok(Json(json!({ "success": true, "conversation": details })).into_response());
        }

        match (query.user_type.as_deref(), query.user_id) {
            (Some(user_type), Some(user_id)) => {
                let user_type: UserType = user_type.parse()?;
                let conversations = resources
                    .conversations
                    .list_for_user(user_id, user_type, include_messages)
                    .await?;
                Ok(Json(json!({
                    "success": true,
                    "count": conversations.len(),
                    "conversations": conversations,
                }))
                .into_response())
            }
            _ => Err(AppError::invalid_input(
                "Provide either id, or userType and userId",
            )),
        }
    }

    async fn list_for_user(
        State(resources): State<Arc<ServerResources>>,
        ApiPath((user_type, user_id)): ApiPath<(String, i64)>,
    ) -> Result<Response, AppError> {
        let user_type: UserType = user_type.parse()?;
        let conversations = resources
            .conversations
            .list_for_user(user_id, user_type, true)
            .await?;
        Ok(Json(json!({ "success": true, "conversations": conversations })).into_response())
    }

    async fn update_status(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
        ApiJson(request): ApiJson<UpdateStatusRequest>,
    ) -> Result<Response, AppError> {
        let status: ConversationStatus = request.status.trim().parse()?;
        let conversation = resources.conversations.update_status(id, status).await?;
        Ok(Json(json!({ "success": true, "conversation": conversation })).into_response())
    }

    async fn mark_read(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
        ApiJson(request): ApiJson<MarkReadRequest>,
    ) -> Result<Response, AppError> {
        let user_id = request
            .user_id
            .ok_or_else(|| AppError::missing_field("userId"))?;
        let user_type = parse_user_type(request.user_type.as_deref())?;

        let count = resources
            .conversations
            .mark_read(id, user_id, user_type)
            .await?;
        Ok(Json(json!({
            "success": true,
            "message": format!("Marked {count} messages as read"),
            "count": count,
        }))
        .into_response())
    }

    async fn page_messages(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
        ApiQuery(query): ApiQuery<MessageWindowQuery>,
    ) -> Result<Response, AppError> {
        let messages = resources
            .conversations
            .page_messages(id, query.limit, query.offset)
            .await?;
        Ok(Json(json!({
            "success": true,
            "conversationId": id,
            "messages": messages,
        }))
        .into_response())
    }

    async fn list_messages(
        State(resources): State<Arc<ServerResources>>,
        ApiQuery(query): ApiQuery<MessagesQuery>,
    ) -> Result<Response, AppError> {
        let id = query.id.ok_or_else(|| AppError::missing_field("id"))?;
        let messages = resources.conversations.list_messages(id).await?;
        Ok(Json(json!({ "success": true, "messages": messages })).into_response())
    }
}
