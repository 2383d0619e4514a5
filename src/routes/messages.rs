// ABOUTME: Message route handlers: plain sends plus the typed negotiation steps and presence listing
// ABOUTME: Each POST appends one message through NegotiationService and returns it with 201
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::extract::ApiJson;
use crate::errors::{AppError, AppResult};
use crate::models::{ChargeLineItem, MessagePayload, MessageType, UserType};
use crate::resources::ServerResources;
use crate::services::negotiation::{NewMessage, Sender};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Conversation and author shared by every typed send
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderFields {
    /// Target conversation
    pub conversation_id: Option<i64>,
    /// Author ID
    pub sender_id: Option<i64>,
    /// Author kind
    pub sender_type: Option<String>,
}

impl SenderFields {
    fn into_sender(self) -> AppResult<Sender> {
        Ok(Sender {
            conversation_id: self
                .conversation_id
                .ok_or_else(|| AppError::missing_field("conversationId"))?,
            sender_id: self
                .sender_id
                .ok_or_else(|| AppError::missing_field("senderId"))?,
            sender_type: self
                .sender_type
                .as_deref()
                .ok_or_else(|| AppError::missing_field("senderType"))?
                .parse()?,
        })
    }
}

/// Body of `POST /api/message`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickMessageRequest {
    /// Conversation ID
    pub id: Option<i64>,
    /// Message text
    pub content: Option<String>,
    /// Author ID, defaults to the conversation's consumer
    pub sender_id: Option<i64>,
    /// Author kind, defaults to `consumer`
    pub sender_type: Option<String>,
}

/// Body of `POST /api/message/send`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Conversation and author
    #[serde(flatten)]
    pub sender: SenderFields,
    /// `GENERAL` (default) or `SYSTEM`
    pub message_type: Option<MessageType>,
    /// Message text
    pub content: Option<String>,
}

/// Body of `POST /api/message/offer`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    /// Conversation and author
    #[serde(flatten)]
    pub sender: SenderFields,
    /// Offered price
    pub amount: Option<f64>,
    /// What the price covers
    pub description: Option<String>,
    /// Hours the offer stays open
    pub validity_hours: Option<i64>,
}

/// Body of `POST /api/message/charge`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    /// Conversation and author
    #[serde(flatten)]
    pub sender: SenderFields,
    /// Total charged
    pub amount: Option<f64>,
    /// What the charge is for
    pub description: Option<String>,
    /// Optional itemisation
    #[serde(default)]
    pub breakdown: Vec<ChargeLineItem>,
}

/// Body of `POST /api/message/payment`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Conversation and author
    #[serde(flatten)]
    pub sender: SenderFields,
    /// Amount paid
    pub amount: Option<f64>,
    /// Payment channel
    pub method: Option<String>,
    /// Channel reference
    pub transaction_id: Option<String>,
}

/// Body of `POST /api/message/accept-offer` and `/decline-offer`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferReplyRequest {
    /// Conversation and author
    #[serde(flatten)]
    pub sender: SenderFields,
    /// The OFFER message being answered
    pub offer_message_id: Option<i64>,
    /// Decline reason
    pub reason: Option<String>,
}

fn created(message: &crate::models::Message) -> Response {
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    )
        .into_response()
}

/// Message routes implementation
pub struct MessageRoutes;

impl MessageRoutes {
    /// Create all message routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/message", post(Self::quick_message))
            .route("/api/message/send", post(Self::send_message))
            .route("/api/message/offer", post(Self::send_offer))
            .route("/api/message/charge", post(Self::send_charge))
            .route("/api/message/payment", post(Self::send_payment))
            .route("/api/message/accept-offer", post(Self::accept_offer))
            .route("/api/message/decline-offer", post(Self::decline_offer))
            .route("/api/online-users", get(Self::online_users))
            .with_state(resources)
    }

    async fn quick_message(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<QuickMessageRequest>,
    ) -> Result<Response, AppError> {
        let id = request.id.ok_or_else(|| AppError::missing_field("id"))?;
        let content = request
            .content
            .ok_or_else(|| AppError::missing_field("content"))?;
        let conversation = resources
            .database
            .get_conversation(id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let sender_type = match request.sender_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => UserType::Consumer,
        };
        let sender_id = request
            .sender_id
            .unwrap_or_else(|| conversation.participant_id(sender_type));

        let message = resources
            .negotiation
            .send_message(NewMessage {
                conversation_id: conversation.id,
                sender_id,
                sender_type,
                payload: MessagePayload::General,
                content,
            })
            .await?;
        Ok(created(&message))
    }

    async fn send_message(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<SendMessageRequest>,
    ) -> Result<Response, AppError> {
        let sender = request.sender.into_sender()?;
        let payload = match request.message_type.unwrap_or(MessageType::General) {
            MessageType::General => MessagePayload::General,
            MessageType::System => MessagePayload::System,
            other => {
                return Err(AppError::invalid_input(format!(
                    "{other} messages must be sent through their dedicated endpoint"
                )))
            }
        };
        let content = request
            .content
            .ok_or_else(|| AppError::missing_field("content"))?;

        let message = resources
            .negotiation
            .send_message(NewMessage {
                conversation_id: sender.conversation_id,
                sender_id: sender.sender_id,
                sender_type: sender.sender_type,
                payload,
                content,
            })
            .await?;
        Ok(created(&message))
    }

    async fn send_offer(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<OfferRequest>,
    ) -> Result<Response, AppError> {
        let sender = request.sender.into_sender()?;
        let amount = request
            .amount
            .ok_or_else(|| AppError::missing_field("amount"))?;
        let message = resources
            .negotiation
            .send_offer(
                sender,
                amount,
                request.description.as_deref().unwrap_or_default(),
                request.validity_hours,
            )
            .await?;
        Ok(created(&message))
    }

    async fn send_charge(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<ChargeRequest>,
    ) -> Result<Response, AppError> {
        let sender = request.sender.into_sender()?;
        let amount = request
            .amount
            .ok_or_else(|| AppError::missing_field("amount"))?;
        let message = resources
            .negotiation
            .send_charge(
                sender,
                amount,
                request.description.as_deref().unwrap_or_default(),
                request.breakdown,
            )
            .await?;
        Ok(created(&message))
    }

    async fn send_payment(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<PaymentRequest>,
    ) -> Result<Response, AppError> {
        let sender = request.sender.into_sender()?;
        let amount = request
            .amount
            .ok_or_else(|| AppError::missing_field("amount"))?;
        let message = resources
            .negotiation
            .send_payment(
                sender,
                amount,
                request.method.as_deref().unwrap_or_default(),
                request.transaction_id,
            )
            .await?;
        Ok(created(&message))
    }

    async fn accept_offer(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<OfferReplyRequest>,
    ) -> Result<Response, AppError> {
        let sender = request.sender.into_sender()?;
        let offer_id = request
            .offer_message_id
            .ok_or_else(|| AppError::missing_field("offerMessageId"))?;
        let message = resources.negotiation.accept_offer(sender, offer_id).await?;
        Ok(created(&message))
    }

    async fn decline_offer(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(request): ApiJson<OfferReplyRequest>,
    ) -> Result<Response, AppError> {
        let sender = request.sender.into_sender()?;
        let offer_id = request
            .offer_message_id
            .ok_or_else(|| AppError::missing_field("offerMessageId"))?;
        let message = resources
            .negotiation
            .decline_offer(sender, offer_id, request.reason)
            .await?;
        Ok(created(&message))
    }

    async fn online_users(State(resources): State<Arc<ServerResources>>) -> Response {
        let online = resources.presence.list_online().await;
        Json(json!({
            "success": true,
            "count": online.len(),
            "onlineUsers": online,
        }))
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_fields_require_every_part() {
        let missing = SenderFields {
            conversation_id: Some(1),
            sender_id: None,
            sender_type: Some("consumer".to_owned()),
        };
        assert_eq!(
            missing.into_sender().unwrap_err().message,
            "senderId is required"
        );

        let sender = SenderFields {
            conversation_id: Some(1),
            sender_id: Some(2),
            sender_type: Some("service_provider".to_owned()),
        }
        .into_sender()
        .unwrap();
        assert_eq!(sender.sender_type, UserType::ServiceProvider);
    }
}
