// ABOUTME: Consumer route handlers for account creation
// ABOUTME: Delegates validation and PIN hashing to AccountService
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::extract::ApiJson;
use crate::errors::AppError;
use crate::resources::ServerResources;
use crate::services::accounts::ConsumerSignup;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Consumer routes implementation
pub struct ConsumerRoutes;

impl ConsumerRoutes {
    /// Create all consumer routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/consumer-create", post(Self::create_consumer))
            .with_state(resources)
    }

    async fn create_consumer(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(signup): ApiJson<ConsumerSignup>,
    ) -> Result<Response, AppError> {
        let consumer = resources.accounts.create_consumer(signup).await?;
        Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "Consumer created successfully",
                "data": consumer,
            })),
        )
            .into_response())
    }
}
