// ABOUTME: HTTP server assembly: merges route groups, applies middleware and serves with graceful shutdown
// ABOUTME: Also starts the subscription sweeper and OTP purger housekeeping tasks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! Server bootstrap
//!
//! [`HojaegaServer`] owns the shared [`ServerResources`]. [`HojaegaServer::router`]
//! is used directly by tests; [`HojaegaServer::run`] binds the configured
//! address and serves until Ctrl-C.

use crate::constants::otp::PURGE_INTERVAL_SECS;
use crate::errors::set_expose_internal_details;
use crate::middleware::{setup_cors, with_request_tracing};
use crate::resources::ServerResources;
use crate::routes::{
    ConsumerRoutes, ConversationRoutes, HealthRoutes, MessageRoutes, OtpRoutes, ProviderRoutes,
    WebSocketRoutes,
};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The Hojaega marketplace server
pub struct HojaegaServer {
    resources: Arc<ServerResources>,
}

impl HojaegaServer {
    /// Wrap already-built resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Shared resources backing every handler
    #[must_use]
    pub const fn resources(&self) -> &Arc<ServerResources> {
        &self.resources
    }

    /// Build the complete application router with CORS and request tracing
    #[must_use]
    pub fn router(&self) -> Router {
        let resources = &self.resources;
        Router::new()
            .merge(HealthRoutes::routes(Arc::clone(resources)))
            .merge(ProviderRoutes::routes(Arc::clone(resources)))
            .merge(ConsumerRoutes::routes(Arc::clone(resources)))
            .merge(OtpRoutes::routes(Arc::clone(resources)))
            .merge(ConversationRoutes::routes(Arc::clone(resources)))
            .merge(MessageRoutes::routes(Arc::clone(resources)))
            .merge(WebSocketRoutes::routes(Arc::clone(&resources.presence)))
            .layer(with_request_tracing())
            .layer(setup_cors(&resources.config))
    }

    /// Start the background housekeeping tasks configured for this server
    ///
    /// A zero interval or retention disables the corresponding task.
    #[must_use]
    pub fn spawn_housekeeping(&self) -> Vec<JoinHandle<()>> {
        let config = &self.resources.config;
        let mut handles = Vec::new();

        let sweep_every = config.subscription.sweep_interval_secs;
        if sweep_every > 0 {
            info!("Subscription sweeper running every {sweep_every}s");
            handles.push(
                self.resources
                    .subscriptions
                    .spawn_sweeper(Duration::from_secs(sweep_every)),
            );
        } else {
            warn!("Subscription sweeper disabled; expiry is only applied on pending lookups");
        }

        let retention_hours = config.otp.purge_after_hours;
        if retention_hours > 0 {
            handles.push(self.resources.otp.spawn_purger(
                Duration::from_secs(PURGE_INTERVAL_SECS),
                chrono::Duration::hours(retention_hours),
            ));
        }

        handles
    }

    /// Bind the configured address and serve until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the server fails
    pub async fn run(self) -> Result<()> {
        let config = Arc::clone(&self.resources.config);
        set_expose_internal_details(config.environment.is_development());

        let housekeeping = self.spawn_housekeeping();
        let app = self.router();

        let address = config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {address}"))?;
        info!("Hojaega server listening on http://{address}");
        info!("WebSocket endpoint: ws://{address}/ws");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server terminated with an error")?;

        for handle in housekeeping {
            handle.abort();
        }
        info!("Hojaega server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
