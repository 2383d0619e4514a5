// ABOUTME: Real-time delivery layer: domain events, presence tracking and the WebSocket transport
// ABOUTME: Messaging services publish events here without knowing about connected clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

/// Domain events and the dispatcher task
pub mod events;
/// Connection and channel tracking
pub mod presence;
/// Wire protocol and connection loop
pub mod websocket;

pub use events::{DeliveryDispatcher, DomainEvent, EventPublisher, Notification};
pub use presence::{Channel, ConnectionId, OnlineUser, PresenceHub};
pub use websocket::{handle_connection, ClientEvent, ServerEvent};
