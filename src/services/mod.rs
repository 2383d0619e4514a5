// ABOUTME: Domain service layer holding the marketplace business rules behind the HTTP and WebSocket handlers
// ABOUTME: Each service owns an Arc<Database> and is shared through ServerResources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! Domain service layer
//!
//! Route handlers stay thin: they parse input and delegate here, so the same
//! rules apply whichever transport a request arrives on.

/// Provider and consumer accounts, sign-in and PIN reset
pub mod accounts;

/// Conversation lifecycle, listing and read tracking
pub mod conversations;

/// Typed negotiation messages
pub mod negotiation;

/// One-time passcodes
pub mod otp;

/// Provider subscription periods
pub mod subscription;

pub use accounts::AccountService;
pub use conversations::ConversationService;
pub use negotiation::NegotiationService;
pub use otp::OtpEngine;
pub use subscription::SubscriptionTracker;
