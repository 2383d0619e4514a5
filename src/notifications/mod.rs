// ABOUTME: Outbound notification channels for the marketplace server
// ABOUTME: Currently SMS delivery of one-time passcodes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

/// SMS gateways
pub mod sms;

pub use sms::{sms_sender_from_config, LoggingSmsSender, SmsSender, TextBeeSmsSender};
