// ABOUTME: WebSocket upgrade route for real-time message and notification delivery
// ABOUTME: Hands each upgraded socket to the presence layer's connection loop
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::realtime::{handle_connection, PresenceHub};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{debug, info};

/// WebSocket routes implementation
pub struct WebSocketRoutes;

impl WebSocketRoutes {
    /// Create the `/ws` route backed by the shared presence hub
    pub fn routes(presence: Arc<PresenceHub>) -> Router {
        Router::new()
            .route("/ws", get(Self::handle_websocket))
            .with_state(presence)
    }

    async fn handle_websocket(
        ws: WebSocketUpgrade,
        State(presence): State<Arc<PresenceHub>>,
    ) -> impl IntoResponse {
        info!("New WebSocket connection request");

        ws.on_upgrade(move |socket: WebSocket| async move {
            debug!("WebSocket upgraded, delegating to presence hub");
            handle_connection(presence, socket).await;
        })
    }
}
