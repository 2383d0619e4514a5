// ABOUTME: Core domain models for providers, consumers, OTP codes, conversations and messages
// ABOUTME: Defines the typed negotiation payloads carried as message metadata
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # Domain Models
//!
//! Records mirror the `SQLite` tables one to one. JSON uses camelCase field
//! names, matching what the mobile and web clients send and expect.

use crate::errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Participants
// ============================================================================

/// Kind of marketplace account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// A listed service provider
    ServiceProvider,
    /// A consumer looking for services
    Consumer,
}

impl UserType {
    /// Wire and storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceProvider => "service_provider",
            Self::Consumer => "consumer",
        }
    }

    /// The other side of a conversation
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::ServiceProvider => Self::Consumer,
            Self::Consumer => Self::ServiceProvider,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service_provider" => Ok(Self::ServiceProvider),
            "consumer" => Ok(Self::Consumer),
            other => Err(AppError::invalid_input(format!(
                "userType must be either \"service_provider\" or \"consumer\", got \"{other}\""
            ))),
        }
    }
}

/// Subscription state of a provider, stored as 1 (active) or 0 (expired)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SubscriptionStatus {
    /// Subscription lapsed
    Expired = 0,
    /// Subscription paid up
    Active = 1,
}

impl From<SubscriptionStatus> for u8 {
    fn from(status: SubscriptionStatus) -> Self {
        status as Self
    }
}

impl TryFrom<u8> for SubscriptionStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Expired),
            1 => Ok(Self::Active),
            other => Err(format!("invalid subscription status {other}")),
        }
    }
}

impl SubscriptionStatus {
    /// Decode the stored integer, treating unknown values as expired
    #[must_use]
    pub const fn from_db(value: i64) -> Self {
        if value == 1 {
            Self::Active
        } else {
            Self::Expired
        }
    }

    /// Integer stored in the database
    #[must_use]
    pub const fn as_db(self) -> i64 {
        self as i64
    }
}

/// A listed service provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Provider ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// City of operation
    pub city: String,
    /// Free-text skills description
    pub skillset: String,
    /// Optional profile description
    pub description: Option<String>,
    /// Optional experience summary
    pub experience: Option<String>,
    /// Contact number as entered
    pub contact_no: String,
    /// Digits of the contact number, used for matching
    #[serde(skip)]
    pub contact_digits: String,
    /// bcrypt hash of the PIN
    #[serde(skip)]
    pub pin_hash: Option<String>,
    /// False once soft-deleted
    pub is_active: bool,
    /// Subscription state
    pub status: SubscriptionStatus,
    /// Start of the current subscription period
    pub subscription_start_date: Option<DateTime<Utc>>,
    /// End of the current subscription period
    pub subscription_end_date: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// Participant summary embedded in conversation payloads
    #[must_use]
    pub fn summary(&self) -> ProviderSummary {
        ProviderSummary {
            id: self.id,
            name: self.name.clone(),
            city: self.city.clone(),
            skillset: self.skillset.clone(),
        }
    }
}

/// A consumer account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    /// Consumer ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Home city
    pub city: String,
    /// Optional contact number, required for OTP-based PIN resets
    pub contact_no: Option<String>,
    /// Digits of the contact number
    #[serde(skip)]
    pub contact_digits: Option<String>,
    /// bcrypt hash of the PIN
    #[serde(skip)]
    pub pin_hash: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Consumer {
    /// Participant summary embedded in conversation payloads
    #[must_use]
    pub fn summary(&self) -> ConsumerSummary {
        ConsumerSummary {
            id: self.id,
            name: self.name.clone(),
            city: self.city.clone(),
        }
    }
}

/// Provider fields exposed inside conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSummary {
    /// Provider ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// City of operation
    pub city: String,
    /// Skills description
    pub skillset: String,
}

/// Consumer fields exposed inside conversations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSummary {
    /// Consumer ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Home city
    pub city: String,
}

/// Append-only ledger entry recording a payment proof against a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPayment {
    /// Ledger entry ID
    pub id: i64,
    /// Provider the payment was made for
    pub provider_id: i64,
    /// Amount claimed by the provider, if stated
    pub amount: Option<f64>,
    /// Months of subscription the payment covers
    pub months: u32,
    /// Screenshot path or URL supplied as proof
    pub proof_reference: String,
    /// Upload time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// One-time passcodes
// ============================================================================

/// Scope an OTP code is issued for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpPurpose {
    /// Contact verification without an account
    #[default]
    Generic,
    /// Verification during account creation
    Signup,
    /// Provider sign-in by code
    SpSignin,
    /// PIN reset for an existing account
    PinReset,
}

impl OtpPurpose {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "GENERIC",
            Self::Signup => "SIGNUP",
            Self::SpSignin => "SP_SIGNIN",
            Self::PinReset => "PIN_RESET",
        }
    }

    /// Purposes that only make sense for an existing account
    #[must_use]
    pub const fn requires_existing_account(self) -> bool {
        matches!(self, Self::SpSignin | Self::PinReset)
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERIC" => Ok(Self::Generic),
            "SIGNUP" => Ok(Self::Signup),
            "SP_SIGNIN" => Ok(Self::SpSignin),
            "PIN_RESET" => Ok(Self::PinReset),
            other => Err(AppError::invalid_input(format!(
                "Unknown OTP purpose: {other}"
            ))),
        }
    }
}

/// Stored OTP record; the code itself is only kept as a bcrypt hash
#[derive(Debug, Clone)]
pub struct OtpCode {
    /// Record ID
    pub id: i64,
    /// Contact number the code was sent to
    pub contact_no: String,
    /// Scope of the code
    pub purpose: OtpPurpose,
    /// bcrypt hash of the code
    pub code_hash: String,
    /// Verification attempts made so far
    pub attempts: u32,
    /// Issue time
    pub created_at: DateTime<Utc>,
    /// End of validity
    pub expires_at: DateTime<Utc>,
    /// Set once on successful verification
    pub consumed_at: Option<DateTime<Utc>>,
    /// Set when a newer code for the same scope was issued
    pub superseded_at: Option<DateTime<Utc>>,
}

impl OtpCode {
    /// Whether the validity window has passed
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// ============================================================================
// Conversations
// ============================================================================

/// Conversation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    /// Open for messages
    Active,
    /// Closed after the job was done
    Completed,
    /// Closed without completion
    Cancelled,
}

impl ConversationStatus {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states accept no further transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(AppError::invalid_input(format!(
                "Status must be ACTIVE, COMPLETED, or CANCELLED, got {other}"
            ))),
        }
    }
}

/// The unique thread between one provider and one consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID
    pub id: i64,
    /// Provider participant
    #[serde(rename = "serviceProviderId")]
    pub provider_id: i64,
    /// Consumer participant
    pub consumer_id: i64,
    /// Lifecycle state
    pub status: ConversationStatus,
    /// Time of the most recent message
    pub last_message_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Whether the given account takes part in this conversation
    #[must_use]
    pub const fn is_participant(&self, user_id: i64, user_type: UserType) -> bool {
        match user_type {
            UserType::ServiceProvider => self.provider_id == user_id,
            UserType::Consumer => self.consumer_id == user_id,
        }
    }

    /// ID of the participant of the given type
    #[must_use]
    pub const fn participant_id(&self, user_type: UserType) -> i64 {
        match user_type {
            UserType::ServiceProvider => self.provider_id,
            UserType::Consumer => self.consumer_id,
        }
    }
}

// ============================================================================
// Messages and negotiation payloads
// ============================================================================

/// Message kinds, each with its own metadata shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Price proposal
    Offer,
    /// Acceptance of an offer
    Accept,
    /// Rejection of an offer
    Decline,
    /// Itemised charge
    Charge,
    /// Payment notice
    Payment,
    /// Free text
    General,
    /// Generated by the platform
    System,
}

impl MessageType {
    /// Storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offer => "OFFER",
            Self::Accept => "ACCEPT",
            Self::Decline => "DECLINE",
            Self::Charge => "CHARGE",
            Self::Payment => "PAYMENT",
            Self::General => "GENERAL",
            Self::System => "SYSTEM",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terms of a price offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferTerms {
    /// Offered price
    pub amount: f64,
    /// What the price covers
    pub description: String,
    /// Hours the offer stays open
    pub validity_hours: i64,
    /// Time after which the offer can no longer be accepted
    pub offer_expires_at: DateTime<Utc>,
}

/// Reference to an accepted offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferAcceptance {
    /// ID of the OFFER message
    pub accepted_offer_id: i64,
    /// Acceptance time
    pub accepted_at: DateTime<Utc>,
}

/// Reference to a declined offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDecline {
    /// ID of the OFFER message
    pub declined_offer_id: i64,
    /// Decline time
    pub declined_at: DateTime<Utc>,
    /// Optional explanation
    #[serde(default)]
    pub reason: Option<String>,
}

/// One line of a charge breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeLineItem {
    /// What the line is for
    pub item: String,
    /// Line amount
    pub amount: f64,
}

/// Itemised charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeDetails {
    /// Total charged
    pub amount: f64,
    /// What the charge is for
    pub description: String,
    /// Optional itemisation
    #[serde(default)]
    pub breakdown: Vec<ChargeLineItem>,
    /// Time the charge was raised
    pub timestamp: DateTime<Utc>,
}

/// Payment notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotice {
    /// Amount paid
    pub amount: f64,
    /// Payment channel, e.g. cash or `JazzCash`
    pub method: String,
    /// Reference issued by the payment channel
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// Time the payment was reported
    pub timestamp: DateTime<Utc>,
}

/// Typed message metadata keyed by message type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "metadata", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePayload {
    /// Price proposal
    Offer(OfferTerms),
    /// Acceptance of an offer
    Accept(OfferAcceptance),
    /// Rejection of an offer
    Decline(OfferDecline),
    /// Itemised charge
    Charge(ChargeDetails),
    /// Payment notice
    Payment(PaymentNotice),
    /// Free text
    General,
    /// Generated by the platform
    System,
}

impl MessagePayload {
    /// Message type this payload belongs to
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Offer(_) => MessageType::Offer,
            Self::Accept(_) => MessageType::Accept,
            Self::Decline(_) => MessageType::Decline,
            Self::Charge(_) => MessageType::Charge,
            Self::Payment(_) => MessageType::Payment,
            Self::General => MessageType::General,
            Self::System => MessageType::System,
        }
    }

    /// Serialize the metadata half for storage; `None` for types without metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized
    pub fn metadata_json(&self) -> AppResult<Option<String>> {
        let encoded = match self {
            Self::Offer(terms) => serde_json::to_string(terms)?,
            Self::Accept(acceptance) => serde_json::to_string(acceptance)?,
            Self::Decline(decline) => serde_json::to_string(decline)?,
            Self::Charge(charge) => serde_json::to_string(charge)?,
            Self::Payment(payment) => serde_json::to_string(payment)?,
            Self::General | Self::System => return Ok(None),
        };
        Ok(Some(encoded))
    }

    /// Rebuild a payload from its stored type and metadata
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata does not match the shape of the type
    pub fn from_stored(message_type: MessageType, metadata: Option<&str>) -> AppResult<Self> {
        let metadata: Value = match metadata {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Value::Null,
        };
        let tagged = if metadata.is_null() {
            json!({ "messageType": message_type })
        } else {
            json!({ "messageType": message_type, "metadata": metadata })
        };
        Ok(serde_json::from_value(tagged)?)
    }

    /// The offer terms, if this is an OFFER
    #[must_use]
    pub const fn as_offer(&self) -> Option<&OfferTerms> {
        match self {
            Self::Offer(terms) => Some(terms),
            _ => None,
        }
    }
}

/// A single entry in a conversation's append-only message log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: i64,
    /// Owning conversation
    pub conversation_id: i64,
    /// Author ID
    pub sender_id: i64,
    /// Author kind
    pub sender_type: UserType,
    /// Type tag and typed metadata
    #[serde(flatten)]
    pub payload: MessagePayload,
    /// Display text
    pub content: String,
    /// Flips to true once read by the recipient
    pub is_read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Message type of the payload
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.payload.message_type()
    }
}

/// Render an amount the way clients display it (no trailing `.0`)
#[must_use]
pub fn format_amount(amount: f64) -> String {
    format!("{amount}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_user_type_round_trips_through_wire_names() {
        assert_eq!(
            "service_provider".parse::<UserType>().unwrap(),
            UserType::ServiceProvider
        );
        assert_eq!(UserType::Consumer.counterpart(), UserType::ServiceProvider);
        assert!("provider".parse::<UserType>().is_err());
        assert_eq!(
            serde_json::to_string(&UserType::ServiceProvider).unwrap(),
            "\"service_provider\""
        );
    }

    #[test]
    fn test_subscription_status_serializes_as_integer() {
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::Active).unwrap(),
            "1"
        );
        let parsed: SubscriptionStatus = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Expired);
        assert!(serde_json::from_str::<SubscriptionStatus>("7").is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ConversationStatus::Active.is_terminal());
        assert!(ConversationStatus::Completed.is_terminal());
        assert!(ConversationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_offer_payload_restores_from_storage() {
        let payload = MessagePayload::Offer(OfferTerms {
            amount: 1500.0,
            description: "Fix kitchen sink".to_owned(),
            validity_hours: 24,
            offer_expires_at: fixed_time(),
        });

        let stored = payload.metadata_json().unwrap();
        let restored = MessagePayload::from_stored(MessageType::Offer, stored.as_deref()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_general_payload_has_no_metadata() {
        assert!(MessagePayload::General.metadata_json().unwrap().is_none());
        let restored = MessagePayload::from_stored(MessageType::General, None).unwrap();
        assert_eq!(restored, MessagePayload::General);
    }

    #[test]
    fn test_mismatched_metadata_is_rejected() {
        let result = MessagePayload::from_stored(MessageType::Payment, Some("{\"foo\":1}"));
        assert!(result.is_err());
    }

    #[test]
    fn test_message_json_carries_type_and_metadata() {
        let message = Message {
            id: 3,
            conversation_id: 1,
            sender_id: 2,
            sender_type: UserType::Consumer,
            payload: MessagePayload::Decline(OfferDecline {
                declined_offer_id: 2,
                declined_at: fixed_time(),
                reason: Some("Too expensive".to_owned()),
            }),
            content: "Offer declined: Too expensive".to_owned(),
            is_read: false,
            created_at: fixed_time(),
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["messageType"], "DECLINE");
        assert_eq!(value["metadata"]["declinedOfferId"], 2);
        assert_eq!(value["senderType"], "consumer");
        assert_eq!(value["conversationId"], 1);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1500.0), "1500");
        assert_eq!(format_amount(99.5), "99.5");
    }
}
