// ABOUTME: SMS delivery abstraction with a TextBee gateway client and a log-only fallback
// ABOUTME: Used by the OTP engine to hand freshly issued codes to the user's phone
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::config::{SmsConfig, TextBeeConfig};
use crate::constants::defaults::SMS_TIMEOUT_SECS;
use crate::errors::{AppError, AppResult};
use crate::logging::mask_contact;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Something that can deliver a text message to a phone number
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Deliver `message` to `recipient`
    async fn send(&self, recipient: &str, message: &str) -> AppResult<()>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Sender used when no gateway is configured; records that a message would have gone out
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSmsSender;

#[async_trait]
impl SmsSender for LoggingSmsSender {
    async fn send(&self, recipient: &str, message: &str) -> AppResult<()> {
        info!(
            sms.recipient = %mask_contact(recipient),
            sms.length = message.len(),
            "SMS gateway not configured, message not delivered"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Serialize)]
struct SendSmsRequest<'a> {
    recipients: [&'a str; 1],
    message: &'a str,
}

/// `TextBee` Android gateway client
pub struct TextBeeSmsSender {
    client: reqwest::Client,
    config: TextBeeConfig,
}

impl TextBeeSmsSender {
    /// Build a client for the configured device
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: TextBeeConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SMS_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::config(format!("Failed to create SMS HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/gateway/devices/{}/send-sms",
            self.config.base_url.trim_end_matches('/'),
            self.config.device_id
        )
    }
}

#[async_trait]
impl SmsSender for TextBeeSmsSender {
    async fn send(&self, recipient: &str, message: &str) -> AppResult<()> {
        let response = self
            .client
            .post(self.send_url())
            .header("x-api-key", &self.config.api_key)
            .json(&SendSmsRequest {
                recipients: [recipient],
                message,
            })
            .send()
            .await
            .map_err(|e| AppError::external_service("TextBee", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "TextBee",
                format!("gateway returned {status}: {body}"),
            ));
        }

        debug!(sms.recipient = %mask_contact(recipient), "SMS accepted by TextBee");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "textbee"
    }
}

/// Pick the SMS sender for this configuration
///
/// # Errors
///
/// Returns an error if the configured gateway client cannot be built
pub fn sms_sender_from_config(config: &SmsConfig) -> AppResult<Arc<dyn SmsSender>> {
    match &config.textbee {
        Some(textbee) => Ok(Arc::new(TextBeeSmsSender::new(textbee.clone())?)),
        None => Ok(Arc::new(LoggingSmsSender)),
    }
}
