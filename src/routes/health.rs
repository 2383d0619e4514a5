// ABOUTME: Health check route handler for liveness probes
// ABOUTME: Reports service name, version and whether the database answers a trivial query
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::constants::service_names::{HOJAEGA_SERVER, SERVER_VERSION};
use crate::resources::ServerResources;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::health))
            .with_state(resources)
    }

    async fn health(State(resources): State<Arc<ServerResources>>) -> (StatusCode, Json<Value>) {
        let database_ok = match sqlx::query("SELECT 1")
            .execute(resources.database.pool())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("Health check database probe failed: {e}");
                false
            }
        };

        let status = if database_ok {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (
            status,
            Json(json!({
                "status": if database_ok { "healthy" } else { "degraded" },
                "service": HOJAEGA_SERVER,
                "version": SERVER_VERSION,
                "database": database_ok,
                "onlineConnections": resources.presence.connection_count().await,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
    }
}
