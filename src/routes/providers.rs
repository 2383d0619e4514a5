// ABOUTME: Service provider route handlers: CRUD, search, statistics, sign-in and subscription management
// ABOUTME: Wraps AccountService and SubscriptionTracker results in the {success, data, message} envelope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use super::extract::{ApiJson, ApiPath};
use crate::constants::subscription::PAYMENT_UPLOAD_MONTHS;
use crate::database::ProviderFilter;
use crate::errors::AppError;
use crate::resources::ServerResources;
use crate::services::accounts::{ProviderProfileUpdate, ProviderSignup};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Body of `POST /api/sp-filter`
#[derive(Debug, Default, Deserialize)]
pub struct FilterBody {
    /// City substring
    pub city: Option<String>,
    /// Skillset substring
    pub skillset: Option<String>,
    /// Exact experience
    pub experience: Option<String>,
    /// Name substring
    pub name: Option<String>,
    /// Substring of name, city or skillset
    pub search: Option<String>,
}

impl From<FilterBody> for ProviderFilter {
    fn from(body: FilterBody) -> Self {
        let keep = |value: Option<String>| {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        Self {
            city: keep(body.city),
            skillset: keep(body.skillset),
            experience: keep(body.experience),
            name: keep(body.name),
            search: keep(body.search),
        }
    }
}

/// Body of `POST /api/sp-signin`; exactly one of `pin` or `code` is used
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInBody {
    /// Registered contact number
    #[serde(default)]
    pub contact_no: String,
    /// Four digit PIN
    pub pin: Option<String>,
    /// `SP_SIGNIN` one-time code
    pub code: Option<String>,
}

/// Body of `POST /api/sp-renew-subscription/:id`
#[derive(Debug, Deserialize)]
pub struct RenewBody {
    /// Calendar months to grant, 1 when absent
    pub months: Option<u32>,
    /// Payment proof reference (screenshot path or URL)
    #[serde(default)]
    pub screenshot: String,
    /// Amount paid
    pub amount: Option<f64>,
}

/// Body of `POST /api/payment-upload`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUploadBody {
    /// Paying provider
    pub service_provider_id: Option<i64>,
    /// Amount paid
    pub amount: Option<f64>,
    /// Payment proof reference
    #[serde(default)]
    pub screenshot: String,
}

fn envelope(data: impl serde::Serialize, message: &str) -> Result<Value, AppError> {
    Ok(json!({
        "success": true,
        "data": serde_json::to_value(data)?,
        "message": message,
    }))
}

/// Service provider routes implementation
pub struct ProviderRoutes;

impl ProviderRoutes {
    /// Create all provider routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/sp-create", post(Self::create_provider))
            .route("/api/sp-list", get(Self::list_providers))
            .route("/api/sp-get/:id", get(Self::get_provider))
            .route("/api/sp-update/:id", put(Self::update_provider))
            .route("/api/sp-delete/:id", delete(Self::delete_provider))
            .route("/api/sp-filter", post(Self::filter_providers))
            .route("/api/sp-stats", get(Self::provider_stats))
            .route("/api/cities", get(Self::cities))
            .route("/api/sp-signin", post(Self::sign_in))
            .route(
                "/api/sp-renew-subscription/:id",
                post(Self::renew_subscription),
            )
            .route(
                "/api/sp-subscription-status/:id",
                get(Self::subscription_status),
            )
            .route("/api/sp-pending", get(Self::pending))
            .route("/api/payment-upload", post(Self::payment_upload))
            .with_state(resources)
    }

    async fn create_provider(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(signup): ApiJson<ProviderSignup>,
    ) -> Result<Response, AppError> {
        let provider = resources.accounts.create_provider(signup).await?;
        Ok((
            StatusCode::CREATED,
            Json(envelope(provider, "Service provider created successfully")?),
        )
            .into_response())
    }

    async fn list_providers(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let providers = resources.accounts.list_providers().await?;
        let count = providers.len();
        let mut body = envelope(providers, "Service providers retrieved successfully")?;
        body["count"] = json!(count);
        Ok(Json(body).into_response())
    }

    async fn get_provider(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
    ) -> Result<Response, AppError> {
        let provider = resources.accounts.get_provider(id).await?;
        Ok(Json(envelope(provider, "Service provider retrieved successfully")?).into_response())
    }

    async fn update_provider(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
        ApiJson(update): ApiJson<ProviderProfileUpdate>,
    ) -> Result<Response, AppError> {
        let provider = resources.accounts.update_provider(id, update).await?;
        Ok(Json(envelope(provider, "Service provider updated successfully")?).into_response())
    }

    async fn delete_provider(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
    ) -> Result<Response, AppError> {
        resources.accounts.delete_provider(id).await?;
        Ok(Json(json!({
            "success": true,
            "message": "Service provider deleted successfully",
        }))
        .into_response())
    }

    async fn filter_providers(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(body): ApiJson<FilterBody>,
    ) -> Result<Response, AppError> {
        let providers = resources
            .accounts
            .filter_providers(&ProviderFilter::from(body))
            .await?;
        let count = providers.len();
        let mut body = envelope(
            providers,
            "Filtered service providers retrieved successfully",
        )?;
        body["count"] = json!(count);
        Ok(Json(body).into_response())
    }

    async fn provider_stats(
        State(resources): State<Arc<ServerResources>>,
    ) -> Result<Response, AppError> {
        let stats = resources.accounts.provider_stats().await?;
        Ok(Json(envelope(
            stats,
            "Service provider statistics retrieved successfully",
        )?)
        .into_response())
    }

    async fn cities(State(resources): State<Arc<ServerResources>>) -> Result<Response, AppError> {
        let cities = resources.accounts.cities().await?;
        let count = cities.len();
        let mut body = envelope(cities, "Cities list retrieved successfully")?;
        body["count"] = json!(count);
        Ok(Json(body).into_response())
    }

    async fn sign_in(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(body): ApiJson<SignInBody>,
    ) -> Result<Response, AppError> {
        let provider = match (body.pin.as_deref(), body.code.as_deref()) {
            (Some(pin), _) => {
                resources
                    .accounts
                    .sign_in_provider(&body.contact_no, pin.trim())
                    .await?
            }
            (None, Some(code)) => {
                resources
                    .accounts
                    .sign_in_provider_with_otp(&body.contact_no, code.trim())
                    .await?
            }
            (None, None) => return Err(AppError::missing_field("pin")),
        };
        Ok(Json(envelope(provider, "Service provider signed in successfully")?).into_response())
    }

    async fn renew_subscription(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
        ApiJson(body): ApiJson<RenewBody>,
    ) -> Result<Response, AppError> {
        let months = body.months.unwrap_or(1);
        let receipt = resources
            .subscriptions
            .renew(id, months, &body.screenshot, body.amount)
            .await?;
        Ok(Json(envelope(
            receipt,
            &format!("Subscription renewed successfully for {months} month(s)"),
        )?)
        .into_response())
    }

    async fn subscription_status(
        State(resources): State<Arc<ServerResources>>,
        ApiPath(id): ApiPath<i64>,
    ) -> Result<Response, AppError> {
        let view = resources.subscriptions.get_status(id).await?;
        let message = view.message.clone();
        Ok(Json(envelope(view, &message)?).into_response())
    }

    async fn pending(State(resources): State<Arc<ServerResources>>) -> Result<Response, AppError> {
        let pending = resources.subscriptions.list_pending().await?;
        let count = pending.len();
        let mut body = envelope(
            pending,
            &format!("Found {count} service providers with expired subscriptions"),
        )?;
        body["count"] = json!(count);
        Ok(Json(body).into_response())
    }

    async fn payment_upload(
        State(resources): State<Arc<ServerResources>>,
        ApiJson(body): ApiJson<PaymentUploadBody>,
    ) -> Result<Response, AppError> {
        let provider_id = body
            .service_provider_id
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                AppError::invalid_input("serviceProviderId and amount must be valid positive numbers")
            })?;
        let amount = body
            .amount
            .filter(|amount| amount.is_finite() && *amount > 0.0)
            .ok_or_else(|| {
                AppError::invalid_input("serviceProviderId and amount must be valid positive numbers")
            })?;
        if body.screenshot.trim().is_empty() {
            return Err(AppError::missing_field("screenshot"));
        }

        let receipt = resources
            .subscriptions
            .renew(
                provider_id,
                PAYMENT_UPLOAD_MONTHS,
                &body.screenshot,
                Some(amount),
            )
            .await?;
        Ok(Json(json!({
            "success": true,
            "message": "Payment uploaded and subscription renewed successfully",
            "subscriptionRenewed": true,
            "payment": receipt.payment,
            "details": {
                "serviceProviderId": provider_id,
                "amount": amount,
                "subscriptionEndDate": receipt.subscription_end_date,
            },
        }))
        .into_response())
    }
}
