// ABOUTME: In-process presence hub tracking WebSocket connections, identities and channel memberships
// ABOUTME: Delivers server events to a user's personal channel or to everyone who joined a conversation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # Presence
//!
//! One process owns every connection. All state sits behind a single
//! `RwLock`; delivery pushes onto each connection's unbounded outbound
//! queue, so nothing awaits the network while the lock is held. Events sent
//! to a channel nobody has joined are dropped; the message log in the
//! database is the durable copy.

use super::events::Notification;
use super::websocket::{EventSender, ServerEvent};
use crate::database::Database;
use crate::errors::AppResult;
use crate::logging::AppLogger;
use crate::models::{Conversation, UserType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one WebSocket connection
pub type ConnectionId = Uuid;

/// Delivery channel a connection can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Everything addressed to one account
    User(UserType, i64),
    /// Everything posted in one conversation
    Conversation(i64),
}

/// Account bound to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Account ID
    pub user_id: i64,
    /// Account kind
    pub user_type: UserType,
}

/// One authenticated connection as listed by `/online-users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    /// Account ID
    pub user_id: i64,
    /// Account kind
    pub user_type: UserType,
    /// Connection carrying the session
    pub connection_id: ConnectionId,
}

struct Connection {
    sender: EventSender,
    identity: Option<Identity>,
    channels: HashSet<Channel>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, Connection>,
    channels: HashMap<Channel, HashSet<ConnectionId>>,
}

impl HubState {
    fn subscribe(&mut self, id: ConnectionId, channel: Channel) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.channels.insert(channel);
            self.channels.entry(channel).or_default().insert(id);
        }
    }

    fn unsubscribe(&mut self, id: ConnectionId, channel: Channel) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.channels.remove(&channel);
        }
        if let Some(members) = self.channels.get_mut(&channel) {
            members.remove(&id);
            if members.is_empty() {
                self.channels.remove(&channel);
            }
        }
    }

    fn emit(&self, id: ConnectionId, event: ServerEvent) {
        if let Some(connection) = self.connections.get(&id) {
            if connection.sender.send(event).is_err() {
                debug!(connection_id = %id, "Outbound queue closed");
            }
        }
    }

    fn broadcast(&self, channel: Channel, event: &ServerEvent) -> usize {
        let Some(members) = self.channels.get(&channel) else {
            return 0;
        };
        members
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter(|connection| connection.sender.send(event.clone()).is_ok())
            .count()
    }
}

/// Tracks who is connected and which channels each connection listens on
pub struct PresenceHub {
    database: Arc<Database>,
    state: RwLock<HubState>,
}

impl PresenceHub {
    /// Create an empty hub
    #[must_use]
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            state: RwLock::new(HubState::default()),
        }
    }

    /// Track a new anonymous connection
    pub async fn register(&self, id: ConnectionId, sender: EventSender) {
        self.state.write().await.connections.insert(
            id,
            Connection {
                sender,
                identity: None,
                channels: HashSet::new(),
            },
        );
    }

    /// Forget a connection and every channel it joined
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut state = self.state.write().await;
        let Some(connection) = state.connections.remove(&id) else {
            return;
        };
        for channel in &connection.channels {
            if let Some(members) = state.channels.get_mut(channel) {
                members.remove(&id);
                if members.is_empty() {
                    state.channels.remove(channel);
                }
            }
        }
        if let Some(identity) = connection.identity {
            info!(
                user_id = identity.user_id,
                user_type = %identity.user_type,
                "User went offline"
            );
        }
    }

    /// Bind a connection to an account after checking the account exists
    ///
    /// Emits `authenticated` or `auth_error` on the connection and returns
    /// whether authentication succeeded. A later successful call replaces the
    /// previous identity.
    pub async fn authenticate(&self, id: ConnectionId, user_id: i64, user_type: UserType) -> bool {
        let exists = match self.account_exists(user_id, user_type).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!(error = %e, "Presence authentication lookup failed");
                self.state.read().await.emit(
                    id,
                    ServerEvent::AuthError {
                        message: "Authentication failed".to_owned(),
                    },
                );
                return false;
            }
        };

        let mut state = self.state.write().await;
        if !exists {
            let message = match user_type {
                UserType::ServiceProvider => "Service provider not found",
                UserType::Consumer => "Consumer not found",
            };
            state.emit(
                id,
                ServerEvent::AuthError {
                    message: message.to_owned(),
                },
            );
            AppLogger::log_auth_event(user_type.as_str(), user_id, "websocket_auth", false);
            return false;
        }

        let previous = match state.connections.get_mut(&id) {
            Some(connection) => connection.identity.replace(Identity { user_id, user_type }),
            None => return false,
        };
        if let Some(previous) = previous {
            state.unsubscribe(id, Channel::User(previous.user_type, previous.user_id));
        }
        state.subscribe(id, Channel::User(user_type, user_id));
        state.emit(
            id,
            ServerEvent::Authenticated {
                message: "Successfully authenticated".to_owned(),
            },
        );
        drop(state);

        AppLogger::log_auth_event(user_type.as_str(), user_id, "websocket_auth", true);
        true
    }

    /// Subscribe an authenticated participant to a conversation channel
    pub async fn join_conversation(&self, id: ConnectionId, conversation_id: i64) -> bool {
        if !self.authorize_conversation(id, conversation_id).await {
            return false;
        }
        let mut state = self.state.write().await;
        state.subscribe(id, Channel::Conversation(conversation_id));
        state.emit(id, ServerEvent::JoinedConversation { conversation_id });
        true
    }

    /// Unsubscribe an authenticated participant from a conversation channel
    pub async fn leave_conversation(&self, id: ConnectionId, conversation_id: i64) -> bool {
        if !self.authorize_conversation(id, conversation_id).await {
            return false;
        }
        let mut state = self.state.write().await;
        state.unsubscribe(id, Channel::Conversation(conversation_id));
        state.emit(id, ServerEvent::LeftConversation { conversation_id });
        true
    }

    /// Deliver to everyone who joined the conversation; returns the number of recipients
    pub async fn send_to_conversation(&self, conversation_id: i64, event: &ServerEvent) -> usize {
        self.state
            .read()
            .await
            .broadcast(Channel::Conversation(conversation_id), event)
    }

    /// Deliver to every connection of one account; returns the number of recipients
    pub async fn send_to_user(&self, user_id: i64, user_type: UserType, event: &ServerEvent) -> usize {
        self.state
            .read()
            .await
            .broadcast(Channel::User(user_type, user_id), event)
    }

    /// Push a `notification` event to an account
    pub async fn notify(&self, user_id: i64, user_type: UserType, notification: Notification) -> usize {
        self.send_to_user(user_id, user_type, &ServerEvent::Notification(notification))
            .await
    }

    /// Whether the account has at least one authenticated connection
    pub async fn is_online(&self, user_id: i64, user_type: UserType) -> bool {
        self.state
            .read()
            .await
            .channels
            .get(&Channel::User(user_type, user_id))
            .is_some_and(|members| !members.is_empty())
    }

    /// Every authenticated connection
    pub async fn list_online(&self) -> Vec<OnlineUser> {
        let state = self.state.read().await;
        let mut online: Vec<OnlineUser> = state
            .connections
            .iter()
            .filter_map(|(id, connection)| {
                connection.identity.map(|identity| OnlineUser {
                    user_id: identity.user_id,
                    user_type: identity.user_type,
                    connection_id: *id,
                })
            })
            .collect();
        online.sort_by_key(|user| (user.user_type.as_str(), user.user_id));
        online
    }

    /// Number of open connections, authenticated or not
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    async fn account_exists(&self, user_id: i64, user_type: UserType) -> AppResult<bool> {
        Ok(match user_type {
            UserType::ServiceProvider => self.database.get_provider(user_id).await?.is_some(),
            UserType::Consumer => self.database.get_consumer(user_id).await?.is_some(),
        })
    }

    /// Check the connection is authenticated as a participant, emitting `error` otherwise
    async fn authorize_conversation(&self, id: ConnectionId, conversation_id: i64) -> bool {
        let identity = self
            .state
            .read()
            .await
            .connections
            .get(&id)
            .and_then(|connection| connection.identity);
        let Some(identity) = identity else {
            self.reject(id, "Authentication required").await;
            return false;
        };

        let conversation: Option<Conversation> =
            match self.database.get_conversation(conversation_id).await {
                Ok(conversation) => conversation,
                Err(e) => {
                    warn!(error = %e, conversation_id, "Conversation lookup failed");
                    self.reject(id, "Failed to load conversation").await;
                    return false;
                }
            };

        match conversation {
            None => {
                self.reject(id, "Conversation not found").await;
                false
            }
            Some(conversation) if !conversation.is_participant(identity.user_id, identity.user_type) => {
                self.reject(id, "Not a participant of this conversation").await;
                false
            }
            Some(_) => true,
        }
    }

    async fn reject(&self, id: ConnectionId, message: &str) {
        self.state.read().await.emit(id, ServerEvent::error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseUrl;
    use crate::models::MessageType;
    use tokio::sync::mpsc;

    async fn empty_hub() -> PresenceHub {
        let database = Database::new(&DatabaseUrl::Memory).await.unwrap();
        database.migrate().await.unwrap();
        PresenceHub::new(Arc::new(database))
    }

    #[tokio::test]
    async fn test_unknown_account_gets_auth_error() {
        let hub = empty_hub().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        hub.register(id, tx).await;

        assert!(!hub.authenticate(id, 42, UserType::Consumer).await);
        match rx.recv().await.unwrap() {
            ServerEvent::AuthError { message } => assert_eq!(message, "Consumer not found"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!hub.is_online(42, UserType::Consumer).await);
        assert!(hub.list_online().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_requires_authentication() {
        let hub = empty_hub().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        hub.register(id, tx).await;

        assert!(!hub.join_conversation(id, 1).await);
        match rx.recv().await.unwrap() {
            ServerEvent::Error { message } => assert_eq!(message, "Authentication required"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_channel_without_members_drops_events() {
        let hub = empty_hub().await;
        let delivered = hub
            .notify(
                1,
                UserType::ServiceProvider,
                Notification {
                    conversation_id: 1,
                    sender_name: None,
                    message_type: MessageType::General,
                    content: "hi".to_owned(),
                },
            )
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_disconnect_clears_connection() {
        let hub = empty_hub().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        hub.register(id, tx).await;
        assert_eq!(hub.connection_count().await, 1);

        hub.disconnect(id).await;
        hub.disconnect(id).await;
        assert_eq!(hub.connection_count().await, 0);
    }
}
