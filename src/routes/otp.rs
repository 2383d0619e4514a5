// ABOUTME: OTP route handlers for code issuance, verification and OTP-backed PIN reset
// ABOUTME: Returns the plaintext code only when the server is configured to expose it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::extract::ApiJson;
use crate::errors::AppError;
use crate::models::{OtpPurpose, UserType};
use crate::resources::ServerResources;
use crate::services::otp::{OtpIssued, OtpRequest};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Body of `POST /api/otp/request`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpBody {
    /// Contact number, 6 to 15 digits
    #[serde(default)]
    pub contact_no: String,
    /// Scope of the code, `GENERIC` when absent
    #[serde(default)]
    pub purpose: OtpPurpose,
    /// Code length
    pub length: Option<usize>,
    /// Validity in seconds
    pub ttl_seconds: Option<i64>,
}

/// Body of `POST /api/otp/verify`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpBody {
    /// Contact number the code was issued for
    #[serde(default)]
    pub contact_no: String,
    /// Scope of the code, `GENERIC` when absent
    #[serde(default)]
    pub purpose: OtpPurpose,
    /// Code as typed by the user
    #[serde(default)]
    pub code: String,
}

/// Body of `POST /api/forgot-password`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordBody {
    /// Contact number of the account
    #[serde(default)]
    pub contact_no: String,
    /// `PIN_RESET` code
    #[serde(default)]
    pub code: String,
    /// Replacement PIN
    #[serde(default)]
    pub new_pin: String,
    /// Restrict the lookup to one account kind
    pub user_type: Option<UserType>,
}

/// Issued code as returned to the client
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IssuedView {
    #[serde(flatten)]
    issued: OtpIssued,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

/// OTP routes implementation
pub struct OtpRoutes;

impl OtpRoutes {
    /// Create all OTP routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/otp/request", post(Self::request_otp))
            .route("/api/otp/verify", post(Self::verify_otp))
            .route("/api/forgot-password", post(Self::forgot_password))
            .with_state(resources)
    }

    async fn request_otp(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(body): ApiJson<RequestOtpBody>,
    ) -> Result<Response, AppError> {
        let issued = resources
            .otp
            .request_otp(OtpRequest {
                contact_no: body.contact_no,
                purpose: body.purpose,
                length: body.length,
                ttl_seconds: body.ttl_seconds,
            })
            .await?;

        let code = resources
            .config
            .otp
            .expose_codes
            .then(|| issued.code.clone());
        Ok((
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "message": "OTP generated",
                "data": IssuedView { issued, code },
            })),
        )
            .into_response())
    }

    async fn verify_otp(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(body): ApiJson<VerifyOtpBody>,
    ) -> Result<Response, AppError> {
        if body.code.trim().is_empty() {
            return Err(AppError::missing_field("code"));
        }
        let verified = resources
            .otp
            .verify_otp(&body.contact_no, body.purpose, body.code.trim())
            .await?;
        Ok(Json(json!({
            "success": true,
            "message": "OTP verified",
            "data": verified,
        }))
        .into_response())
    }

    async fn forgot_password(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(body): ApiJson<ForgotPasswordBody>,
    ) -> Result<Response, AppError> {
        if body.code.trim().is_empty() {
            return Err(AppError::missing_field("code"));
        }
        let outcome = resources
            .accounts
            .reset_pin(
                &body.contact_no,
                body.code.trim(),
                body.new_pin.trim(),
                body.user_type,
            )
            .await?;
        Ok(Json(json!({
            "success": true,
            "message": "PIN reset successfully",
            "data": outcome,
        }))
        .into_response())
    }
}
