// ABOUTME: Shared resource container wiring the database, services and presence hub together
// ABOUTME: Built once at startup and handed to every route group as Arc<ServerResources>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # Server Resources
//!
//! Owns one instance of every long-lived component. Building the container
//! also opens the domain event channel and spawns the task that delivers
//! those events to WebSocket clients, so it must run inside a Tokio runtime.

use crate::config::ServerConfig;
use crate::credentials::CredentialHasher;
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use crate::notifications::{sms_sender_from_config, SmsSender};
use crate::realtime::{DeliveryDispatcher, EventPublisher, PresenceHub};
use crate::services::{
    AccountService, ConversationService, NegotiationService, OtpEngine, SubscriptionTracker,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything a request handler may need
#[derive(Clone)]
pub struct ServerResources {
    /// Record store
    pub database: Arc<Database>,
    /// Loaded configuration
    pub config: Arc<ServerConfig>,
    /// One-time passcodes
    pub otp: Arc<OtpEngine>,
    /// Provider subscription periods
    pub subscriptions: Arc<SubscriptionTracker>,
    /// Provider and consumer accounts
    pub accounts: Arc<AccountService>,
    /// Conversation lifecycle
    pub conversations: Arc<ConversationService>,
    /// Typed message sending
    pub negotiation: Arc<NegotiationService>,
    /// Connected WebSocket clients
    pub presence: Arc<PresenceHub>,
    /// Task delivering domain events to `presence`
    pub dispatcher: Arc<JoinHandle<()>>,
}

impl ServerResources {
    /// Create a new builder for `ServerResources`
    #[must_use]
    pub const fn builder() -> ServerResourcesBuilder {
        ServerResourcesBuilder::new()
    }
}

/// Builder for [`ServerResources`]
pub struct ServerResourcesBuilder {
    database: Option<Database>,
    config: Option<Arc<ServerConfig>>,
    sms_sender: Option<Arc<dyn SmsSender>>,
}

impl ServerResourcesBuilder {
    /// Create an empty builder
    #[must_use]
    pub const fn new() -> Self {
        Self {
            database: None,
            config: None,
            sms_sender: None,
        }
    }

    /// Set the migrated database
    #[must_use]
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    /// Set the server configuration
    #[must_use]
    pub fn with_config(mut self, config: Arc<ServerConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the SMS sender chosen from configuration
    #[must_use]
    pub fn with_sms_sender(mut self, sender: Arc<dyn SmsSender>) -> Self {
        self.sms_sender = Some(sender);
        self
    }

    /// Assemble the services and start the event dispatcher
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the database or config is missing, or
    /// if the configured SMS gateway client cannot be built
    pub fn build(self) -> AppResult<ServerResources> {
        let database = Arc::new(
            self.database
                .ok_or_else(|| AppError::config("Database is required"))?,
        );
        let config = self
            .config
            .ok_or_else(|| AppError::config("Server config is required"))?;
        let sms_sender = match self.sms_sender {
            Some(sender) => sender,
            None => sms_sender_from_config(&config.sms)?,
        };

        let hasher = CredentialHasher::new(config.security.bcrypt_cost);
        let otp = Arc::new(OtpEngine::new(
            Arc::clone(&database),
            hasher,
            sms_sender,
            config.otp.max_attempts,
        ));
        let accounts = Arc::new(AccountService::new(
            Arc::clone(&database),
            hasher,
            Arc::clone(&otp),
        ));
        let subscriptions = Arc::new(SubscriptionTracker::new(Arc::clone(&database)));
        let conversations = Arc::new(ConversationService::new(Arc::clone(&database)));

        let presence = Arc::new(PresenceHub::new(Arc::clone(&database)));
        let (events, receiver) = EventPublisher::channel();
        let dispatcher = DeliveryDispatcher::spawn(Arc::clone(&presence), receiver);
        let negotiation = Arc::new(NegotiationService::new(Arc::clone(&database), events));

        Ok(ServerResources {
            database,
            config,
            otp,
            subscriptions,
            accounts,
            conversations,
            negotiation,
            presence,
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Build the `ServerResources` wrapped in an `Arc`
    ///
    /// # Errors
    ///
    /// Returns an error if any required fields are missing
    pub fn build_arc(self) -> AppResult<Arc<ServerResources>> {
        Ok(Arc::new(self.build()?))
    }
}

impl Default for ServerResourcesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
