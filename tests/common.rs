// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides in-memory resources, a capturing SMS sender and account seed helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `hojaega_server`

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hojaega_server::{
    config::{DatabaseUrl, ServerConfig},
    database::{providers::set_subscription, Database},
    errors::AppResult,
    models::{Consumer, Conversation, Provider},
    notifications::SmsSender,
    resources::ServerResources,
    services::accounts::{ConsumerSignup, ProviderSignup},
};
use std::sync::{Arc, Mutex, Once};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// SMS sender that keeps every message in memory
#[derive(Default)]
pub struct CapturingSmsSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingSmsSender {
    /// All `(recipient, message)` pairs sent so far
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for CapturingSmsSender {
    async fn send(&self, recipient: &str, message: &str) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_owned(), message.to_owned()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "capturing"
    }
}

/// Configuration for tests: in-memory database, cheap hashing, codes exposed
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.database.url = DatabaseUrl::Memory;
    config.security.bcrypt_cost = 4;
    config.security.cors_origins = vec!["*".to_owned()];
    config.otp.expose_codes = true;
    config.subscription.sweep_interval_secs = 0;
    config.otp.purge_after_hours = 0;
    config
}

/// Standard test database setup
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    Database::new(&DatabaseUrl::Memory).await
}

/// Everything an integration test needs
pub struct TestContext {
    pub resources: Arc<ServerResources>,
    pub sms: Arc<CapturingSmsSender>,
}

/// Build resources over a fresh in-memory database
pub async fn create_test_resources() -> Result<TestContext> {
    create_test_resources_with(test_config()).await
}

/// Build resources with a caller-tuned configuration
pub async fn create_test_resources_with(config: ServerConfig) -> Result<TestContext> {
    let database = create_test_database().await?;
    let sms = Arc::new(CapturingSmsSender::default());
    let resources = ServerResources::builder()
        .with_database(database)
        .with_config(Arc::new(config))
        .with_sms_sender(sms.clone())
        .build_arc()?;
    Ok(TestContext { resources, sms })
}

/// Signup payload for a provider with a unique contact number
pub fn provider_signup(name: &str, city: &str, contact_no: &str) -> ProviderSignup {
    ProviderSignup {
        name: name.to_owned(),
        city: city.to_owned(),
        skillset: "Plumbing and pipe fitting".to_owned(),
        contact_no: contact_no.to_owned(),
        pin: Some("1234".to_owned()),
        description: None,
        experience: Some("5 years".to_owned()),
    }
}

/// Create a provider with PIN 1234
pub async fn create_provider(
    resources: &ServerResources,
    name: &str,
    city: &str,
    contact_no: &str,
) -> Result<Provider> {
    Ok(resources
        .accounts
        .create_provider(provider_signup(name, city, contact_no))
        .await?)
}

/// Create a consumer with PIN 4321
pub async fn create_consumer(
    resources: &ServerResources,
    name: &str,
    contact_no: Option<&str>,
) -> Result<Consumer> {
    Ok(resources
        .accounts
        .create_consumer(ConsumerSignup {
            name: name.to_owned(),
            city: "Lahore".to_owned(),
            pin: "4321".to_owned(),
            contact_no: contact_no.map(str::to_owned),
        })
        .await?)
}

/// One provider, one consumer and the conversation between them
pub struct Participants {
    pub provider: Provider,
    pub consumer: Consumer,
    pub conversation: Conversation,
}

/// Seed a provider/consumer pair with an open conversation
pub async fn seed_conversation(resources: &ServerResources) -> Result<Participants> {
    let provider = create_provider(resources, "Ali Plumber", "Lahore", "03001234567").await?;
    let consumer = create_consumer(resources, "Sara Khan", Some("03007654321")).await?;
    let (conversation, _) = resources
        .conversations
        .create_conversation(provider.id, consumer.id)
        .await?;
    Ok(Participants {
        provider,
        consumer,
        conversation,
    })
}

/// Overwrite a provider's subscription window, leaving status active
pub async fn set_provider_window(
    resources: &ServerResources,
    provider_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let mut tx = resources.database.begin().await?;
    set_subscription(&mut tx, provider_id, start, end).await?;
    tx.commit().await?;
    Ok(())
}

/// Most recent code texted to `recipient`
pub fn last_code_sent_to(sms: &CapturingSmsSender, recipient: &str) -> Option<String> {
    sms.sent()
        .into_iter()
        .rev()
        .find(|(to, _)| to == recipient)
        .and_then(|(_, message)| {
            message
                .split(|c: char| !c.is_ascii_digit())
                .find(|chunk| chunk.len() >= 4)
                .map(str::to_owned)
        })
}
