// ABOUTME: Domain events raised by the messaging services and the dispatcher that delivers them
// ABOUTME: Services publish on an unbounded channel; one task routes events through the presence hub
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::presence::PresenceHub;
use super::websocket::ServerEvent;
use crate::models::{Message, MessageType, UserType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// New-message notice pushed to the participant who did not send it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Conversation the message was posted in
    pub conversation_id: i64,
    /// Display name of the sender, if the account still exists
    pub sender_name: Option<String>,
    /// Type of the new message
    pub message_type: MessageType,
    /// Display text of the new message
    pub content: String,
}

/// Something that happened in the messaging core and should reach connected clients
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// A message was appended to a conversation
    MessageSent {
        /// Conversation channel to deliver on
        conversation_id: i64,
        /// The stored message
        message: Message,
    },
    /// A participant should be told about activity addressed to them
    NotificationRaised {
        /// Recipient account
        recipient_id: i64,
        /// Recipient kind
        recipient_type: UserType,
        /// Notice body
        notification: Notification,
    },
}

/// Publishing half of the domain event channel
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventPublisher {
    /// Create a publisher and the receiver a dispatcher should drain
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event for delivery; events are dropped once the dispatcher has stopped
    pub fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.tx.send(event) {
            warn!(error = ?e.0, "Event dispatcher stopped, dropping domain event");
        }
    }
}

/// Routes domain events to WebSocket channels
pub struct DeliveryDispatcher;

impl DeliveryDispatcher {
    /// Deliver one event; returns how many connections received it
    pub async fn dispatch(hub: &PresenceHub, event: DomainEvent) -> usize {
        match event {
            DomainEvent::MessageSent {
                conversation_id,
                message,
            } => {
                hub.send_to_conversation(conversation_id, &ServerEvent::NewMessage { message })
                    .await
            }
            DomainEvent::NotificationRaised {
                recipient_id,
                recipient_type,
                notification,
            } => hub.notify(recipient_id, recipient_type, notification).await,
        }
    }

    /// Drain `events` until every publisher is dropped
    pub fn spawn(
        hub: Arc<PresenceHub>,
        mut events: mpsc::UnboundedReceiver<DomainEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let delivered = Self::dispatch(&hub, event).await;
                debug!(delivered, "Dispatched domain event");
            }
            debug!("Domain event channel closed, dispatcher exiting");
        })
    }
}
