// ABOUTME: Negotiation protocol over a conversation's message log: offers, charges, payments and replies
// ABOUTME: Appends typed messages atomically and raises delivery events for connected participants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # Negotiation Protocol
//!
//! Every step is an append to the conversation's log. Offers are never
//! mutated; accepting or declining one writes a new message that points at
//! the original by ID.

use crate::constants::negotiation::{
    DEFAULT_OFFER_VALIDITY_HOURS, MAX_CONTENT_LENGTH, MAX_OFFER_VALIDITY_HOURS,
};
use crate::database::{conversations, messages, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    format_amount, ChargeDetails, ChargeLineItem, Message, MessagePayload, OfferAcceptance,
    OfferDecline, OfferTerms, PaymentNotice, UserType,
};
use crate::realtime::{DomainEvent, EventPublisher, Notification};
use chrono::{Duration, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// A message about to be appended
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Target conversation
    pub conversation_id: i64,
    /// Author ID
    pub sender_id: i64,
    /// Author kind
    pub sender_type: UserType,
    /// Type tag and metadata
    pub payload: MessagePayload,
    /// Display text
    pub content: String,
}

/// The author of a negotiation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender {
    /// Conversation the step belongs to
    pub conversation_id: i64,
    /// Author ID
    pub sender_id: i64,
    /// Author kind
    pub sender_type: UserType,
}

impl Sender {
    fn message(self, payload: MessagePayload, content: String) -> NewMessage {
        NewMessage {
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            sender_type: self.sender_type,
            payload,
            content,
        }
    }
}

fn require_positive(amount: f64) -> AppResult<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(AppError::invalid_input("Amount must be greater than 0"))
    }
}

fn require_text(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::missing_field(field));
    }
    Ok(value.to_owned())
}

/// Appends negotiation steps and publishes them for delivery
pub struct NegotiationService {
    database: Arc<Database>,
    events: EventPublisher,
}

impl NegotiationService {
    /// Create the service
    #[must_use]
    pub const fn new(database: Arc<Database>, events: EventPublisher) -> Self {
        Self { database, events }
    }

    /// Append a message and notify the other participant
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for empty or oversized content, `NotFound` for a
    /// missing conversation, `PermissionDenied` when the sender is not the
    /// conversation's participant of that type, or a database error
    pub async fn send_message(&self, new: NewMessage) -> AppResult<Message> {
        let content = new.content.trim().to_owned();
        if content.is_empty() {
            return Err(AppError::missing_field("content"));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(AppError::invalid_input(format!(
                "content cannot exceed {MAX_CONTENT_LENGTH} characters"
            )));
        }

        let mut tx = self.database.begin().await?;
        let conversation = conversations::get_conversation_in(&mut tx, new.conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;
        if !conversation.is_participant(new.sender_id, new.sender_type) {
            return Err(AppError::permission_denied(
                "Sender is not a participant of this conversation",
            ));
        }

        let now = Utc::now().trunc_subsecs(6);
        let message = messages::insert_message(
            &mut tx,
            conversation.id,
            new.sender_id,
            new.sender_type,
            new.payload,
            content,
            now,
        )
        .await?;
        conversations::touch_last_message(&mut tx, conversation.id, now).await?;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit message: {e}")))?;

        debug!(
            conversation.id = conversation.id,
            message.id = message.id,
            message.kind = %message.message_type(),
            "Message appended"
        );

        self.events.publish(DomainEvent::MessageSent {
            conversation_id: conversation.id,
            message: message.clone(),
        });

        // The message is committed; a failed name lookup only degrades the notice
        let sender_name = match self.sender_name(message.sender_id, message.sender_type).await {
            Ok(name) => name,
            Err(e) => {
                warn!(
                    conversation.id = conversation.id,
                    message.id = message.id,
                    error = %e,
                    "Sender name lookup failed, notifying without it"
                );
                None
            }
        };
        let recipient_type = message.sender_type.counterpart();
        self.events.publish(DomainEvent::NotificationRaised {
            recipient_id: conversation.participant_id(recipient_type),
            recipient_type,
            notification: Notification {
                conversation_id: conversation.id,
                sender_name,
                message_type: message.message_type(),
                content: message.content.clone(),
            },
        });

        Ok(message)
    }

    /// Propose a price that stays open for `validity_hours` (24 by default)
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive amount or empty description,
    /// `ValueOutOfRange` for a validity outside 1..=720 hours, or any
    /// [`NegotiationService::send_message`] error
    pub async fn send_offer(
        &self,
        sender: Sender,
        amount: f64,
        description: &str,
        validity_hours: Option<i64>,
    ) -> AppResult<Message> {
        require_positive(amount)?;
        let description = require_text("description", description)?;
        let validity_hours = validity_hours.unwrap_or(DEFAULT_OFFER_VALIDITY_HOURS);
        if !(1..=MAX_OFFER_VALIDITY_HOURS).contains(&validity_hours) {
            return Err(AppError::out_of_range(format!(
                "validityHours must be between 1 and {MAX_OFFER_VALIDITY_HOURS}"
            )));
        }

        let content = format!("Offer: {description} - ${}", format_amount(amount));
        let terms = OfferTerms {
            amount,
            description,
            validity_hours,
            offer_expires_at: Utc::now().trunc_subsecs(6) + Duration::hours(validity_hours),
        };
        self.send_message(sender.message(MessagePayload::Offer(terms), content))
            .await
    }

    /// Raise an itemised charge
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive amount or empty description,
    /// or any [`NegotiationService::send_message`] error
    pub async fn send_charge(
        &self,
        sender: Sender,
        amount: f64,
        description: &str,
        breakdown: Vec<ChargeLineItem>,
    ) -> AppResult<Message> {
        require_positive(amount)?;
        let description = require_text("description", description)?;

        let content = format!("Charge: {description} - ${}", format_amount(amount));
        let details = ChargeDetails {
            amount,
            description,
            breakdown,
            timestamp: Utc::now().trunc_subsecs(6),
        };
        self.send_message(sender.message(MessagePayload::Charge(details), content))
            .await
    }

    /// Report a payment made outside the platform
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a non-positive amount or empty method, or
    /// any [`NegotiationService::send_message`] error
    pub async fn send_payment(
        &self,
        sender: Sender,
        amount: f64,
        method: &str,
        transaction_id: Option<String>,
    ) -> AppResult<Message> {
        require_positive(amount)?;
        let method = require_text("method", method)?;

        let content = format!("Payment: ${} via {method}", format_amount(amount));
        let notice = PaymentNotice {
            amount,
            method,
            transaction_id: transaction_id.filter(|id| !id.trim().is_empty()),
            timestamp: Utc::now().trunc_subsecs(6),
        };
        self.send_message(sender.message(MessagePayload::Payment(notice), content))
            .await
    }

    /// Accept an open offer made by the other participant
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the referenced message is not an OFFER in this
    /// conversation, `Expired` once the offer window has closed,
    /// `PermissionDenied` when the offer's author tries to accept it, or any
    /// [`NegotiationService::send_message`] error
    pub async fn accept_offer(&self, sender: Sender, offer_message_id: i64) -> AppResult<Message> {
        let (offer, terms) = self.load_offer(sender.conversation_id, offer_message_id).await?;

        let now = Utc::now().trunc_subsecs(6);
        if now > terms.offer_expires_at {
            return Err(AppError::expired("Offer has expired"));
        }
        if offer.sender_id == sender.sender_id && offer.sender_type == sender.sender_type {
            return Err(AppError::permission_denied("You cannot accept your own offer"));
        }

        let acceptance = OfferAcceptance {
            accepted_offer_id: offer.id,
            accepted_at: now,
        };
        self.send_message(sender.message(
            MessagePayload::Accept(acceptance),
            "Offer accepted".to_owned(),
        ))
        .await
    }

    /// Decline an offer, optionally saying why
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the referenced message is not an OFFER in this
    /// conversation, or any [`NegotiationService::send_message`] error
    pub async fn decline_offer(
        &self,
        sender: Sender,
        offer_message_id: i64,
        reason: Option<String>,
    ) -> AppResult<Message> {
        let (offer, _) = self.load_offer(sender.conversation_id, offer_message_id).await?;

        let reason = reason
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty());
        let content = reason
            .as_deref()
            .map_or_else(|| "Offer declined".to_owned(), |r| format!("Offer declined: {r}"));
        let decline = OfferDecline {
            declined_offer_id: offer.id,
            declined_at: Utc::now().trunc_subsecs(6),
            reason,
        };
        self.send_message(sender.message(MessagePayload::Decline(decline), content))
            .await
    }

    async fn load_offer(
        &self,
        conversation_id: i64,
        offer_message_id: i64,
    ) -> AppResult<(Message, OfferTerms)> {
        let offer = self
            .database
            .get_message(offer_message_id)
            .await?
            .filter(|m| m.conversation_id == conversation_id)
            .ok_or_else(|| AppError::not_found("Offer"))?;
        let terms = offer
            .payload
            .as_offer()
            .cloned()
            .ok_or_else(|| AppError::not_found("Offer"))?;
        Ok((offer, terms))
    }

    async fn sender_name(&self, sender_id: i64, sender_type: UserType) -> AppResult<Option<String>> {
        Ok(match sender_type {
            UserType::ServiceProvider => self.database.get_provider(sender_id).await?.map(|p| p.name),
            UserType::Consumer => self.database.get_consumer(sender_id).await?.map(|c| c.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert!(require_positive(10.5).is_ok());
        assert!(require_positive(0.0).is_err());
        assert!(require_positive(-3.0).is_err());
        assert!(require_positive(f64::NAN).is_err());
    }

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("method", "  cash ").unwrap(), "cash");
        assert!(require_text("method", "   ").is_err());
    }
}
