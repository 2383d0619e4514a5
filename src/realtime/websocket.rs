// ABOUTME: WebSocket wire protocol and per-connection loop for the presence layer
// ABOUTME: Parses client events, forwards them to the hub and streams server events back as JSON text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! `WebSocket` transport
//!
//! Frames are JSON text of the form `{"event": "...", "data": {...}}`.

use super::events::Notification;
use super::presence::PresenceHub;
use crate::models::{Message, UserType};
use axum::extract::ws::{self, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Bind this connection to an account
    Authenticate {
        /// Account ID
        #[serde(rename = "userId")]
        user_id: i64,
        /// Account kind
        #[serde(rename = "userType")]
        user_type: UserType,
    },
    /// Start receiving a conversation's messages
    JoinConversation {
        /// Conversation to join
        #[serde(rename = "conversationId")]
        conversation_id: i64,
    },
    /// Stop receiving a conversation's messages
    LeaveConversation {
        /// Conversation to leave
        #[serde(rename = "conversationId")]
        conversation_id: i64,
    },
}

/// Events the server pushes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Authentication succeeded
    Authenticated {
        /// Confirmation text
        message: String,
    },
    /// Authentication failed; the connection stays anonymous
    AuthError {
        /// Failure reason
        message: String,
    },
    /// Joined a conversation channel
    JoinedConversation {
        /// Joined conversation
        #[serde(rename = "conversationId")]
        conversation_id: i64,
    },
    /// Left a conversation channel
    LeftConversation {
        /// Left conversation
        #[serde(rename = "conversationId")]
        conversation_id: i64,
    },
    /// A message was posted in a joined conversation
    NewMessage {
        /// The stored message
        message: Message,
    },
    /// Activity addressed to the authenticated user
    Notification(Notification),
    /// A client request could not be honoured
    Error {
        /// Failure reason
        message: String,
    },
}

impl ServerEvent {
    /// Build an `error` event
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Sending half of a connection's outbound queue
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Run one WebSocket connection until the client goes away
pub async fn handle_connection(hub: Arc<PresenceHub>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let connection_id = Uuid::new_v4();

    hub.register(connection_id, tx.clone()).await;
    debug!(%connection_id, "WebSocket connected");

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to encode server event");
                    continue;
                }
            };
            if ws_tx.send(ws::Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        match frame {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(&hub, connection_id, event).await,
                Err(e) => {
                    if tx
                        .send(ServerEvent::error(format!("Invalid message format: {e}")))
                        .is_err()
                    {
                        break;
                    }
                }
            },
            Ok(ws::Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    hub.disconnect(connection_id).await;
    drop(tx);
    writer.abort();
    debug!(%connection_id, "WebSocket disconnected");
}

async fn handle_client_event(hub: &PresenceHub, connection_id: Uuid, event: ClientEvent) {
    match event {
        ClientEvent::Authenticate { user_id, user_type } => {
            hub.authenticate(connection_id, user_id, user_type).await;
        }
        ClientEvent::JoinConversation { conversation_id } => {
            hub.join_conversation(connection_id, conversation_id).await;
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            hub.leave_conversation(connection_id, conversation_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageType;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_format() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "authenticate",
            "data": { "userId": 4, "userType": "consumer" }
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Authenticate {
                user_id: 4,
                user_type: UserType::Consumer
            }
        );

        let join: ClientEvent = serde_json::from_value(json!({
            "event": "join_conversation",
            "data": { "conversationId": 9 }
        }))
        .unwrap();
        assert_eq!(join, ClientEvent::JoinConversation { conversation_id: 9 });
    }

    #[test]
    fn test_server_event_wire_format() {
        let value = serde_json::to_value(ServerEvent::Notification(Notification {
            conversation_id: 3,
            sender_name: Some("Ayesha".to_owned()),
            message_type: MessageType::Offer,
            content: "Offer: Fix geyser - $1500".to_owned(),
        }))
        .unwrap();

        assert_eq!(value["event"], "notification");
        assert_eq!(value["data"]["conversationId"], 3);
        assert_eq!(value["data"]["senderName"], "Ayesha");
        assert_eq!(value["data"]["messageType"], "OFFER");

        let auth = serde_json::to_value(ServerEvent::AuthError {
            message: "Consumer not found".to_owned(),
        })
        .unwrap();
        assert_eq!(auth["event"], "auth_error");
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"shout","data":{}}"#).is_err());
    }
}
