// ABOUTME: Provider subscription tracker: renewals with payment ledger, expiry sweeps and status views
// ABOUTME: Runs a periodic background sweep that flips lapsed subscriptions to expired
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::constants::subscription::{MAX_RENEWAL_MONTHS, SECONDS_PER_DAY};
use crate::database::{payments, providers, Database};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{Provider, ProviderPayment, SubscriptionStatus};
use chrono::{DateTime, Duration, Months, SubsecRound, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const EXPIRED_MESSAGE: &str =
    "Subscription period ended. Please complete your payment to continue services.";

/// Result of a successful renewal
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalReceipt {
    /// Renewed provider
    pub provider_id: i64,
    /// Always active after a renewal
    pub status: SubscriptionStatus,
    /// Start of the new period
    pub subscription_start_date: DateTime<Utc>,
    /// End of the new period
    pub subscription_end_date: DateTime<Utc>,
    /// Months granted
    pub months: u32,
    /// Ledger entry written with the renewal
    pub payment: ProviderPayment,
}

/// Subscription state of one provider as shown to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusView {
    /// Provider ID
    pub provider_id: i64,
    /// Provider name
    pub name: String,
    /// Stored status flag
    pub status: SubscriptionStatus,
    /// Whether the end date has passed
    pub is_expired: bool,
    /// Whole days left, rounded up, never negative
    pub days_until_expiry: i64,
    /// Start of the current period
    pub subscription_start_date: Option<DateTime<Utc>>,
    /// End of the current period
    pub subscription_end_date: Option<DateTime<Utc>>,
    /// Human readable summary
    pub message: String,
}

/// A provider whose subscription needs payment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProvider {
    /// Provider record
    #[serde(flatten)]
    pub provider: Provider,
    /// Prompt shown to the provider
    pub message: String,
    /// Whole days since the end date, rounded up
    pub days_expired: i64,
}

/// Whole days in `span`, rounded toward positive infinity
#[must_use]
pub fn ceil_days(span: Duration) -> i64 {
    let day_ms = SECONDS_PER_DAY * 1000;
    let ms = span.num_milliseconds();
    if ms > 0 {
        (ms + day_ms - 1) / day_ms
    } else {
        ms / day_ms
    }
}

/// Build the status view of a provider at `now`
#[must_use]
pub fn status_view(provider: &Provider, now: DateTime<Utc>) -> SubscriptionStatusView {
    let end = provider.subscription_end_date;
    let is_expired = end.is_some_and(|end| end < now);
    let days = end.map_or(0, |end| ceil_days(end - now));

    let message = if is_expired {
        EXPIRED_MESSAGE.to_owned()
    } else {
        format!("Subscription active. {} days remaining.", days.max(0))
    };

    SubscriptionStatusView {
        provider_id: provider.id,
        name: provider.name.clone(),
        status: provider.status,
        is_expired,
        days_until_expiry: days.max(0),
        subscription_start_date: provider.subscription_start_date,
        subscription_end_date: end,
        message,
    }
}

/// Tracks provider subscription periods
pub struct SubscriptionTracker {
    database: Arc<Database>,
}

impl SubscriptionTracker {
    /// Create a tracker
    #[must_use]
    pub const fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Start a new period of `months` calendar months from now and record the payment proof
    ///
    /// # Errors
    ///
    /// Returns `ValueOutOfRange` for months outside 1..=24, `InvalidInput` for
    /// an empty proof, `NotFound` for missing or deleted providers, or a
    /// database error
    pub async fn renew(
        &self,
        provider_id: i64,
        months: u32,
        proof_reference: &str,
        amount: Option<f64>,
    ) -> AppResult<RenewalReceipt> {
        if !(1..=MAX_RENEWAL_MONTHS).contains(&months) {
            return Err(AppError::out_of_range(format!(
                "months must be between 1 and {MAX_RENEWAL_MONTHS}"
            )));
        }
        let proof_reference = proof_reference.trim();
        if proof_reference.is_empty() {
            return Err(AppError::invalid_input("Payment proof is required"));
        }
        if amount.is_some_and(|a| !a.is_finite() || a <= 0.0) {
            return Err(AppError::invalid_input("amount must be a positive number"));
        }

        let start = Utc::now().trunc_subsecs(6);
        let end = start
            .checked_add_months(Months::new(months))
            .ok_or_else(|| AppError::internal("Subscription end date out of range"))?;

        let mut tx = self.database.begin().await?;
        let active = providers::get_provider_in(&mut tx, provider_id)
            .await?
            .is_some_and(|p| p.is_active);
        if !active {
            return Err(AppError::not_found(format!(
                "Service provider with ID {provider_id}"
            )));
        }

        providers::set_subscription(&mut tx, provider_id, start, end).await?;
        let payment =
            payments::insert_payment(&mut tx, provider_id, amount, months, proof_reference, start)
                .await?;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit renewal: {e}")))?;

        AppLogger::log_subscription_event(
            provider_id,
            "renewed",
            &format!("{months} month(s) until {end}"),
        );

        Ok(RenewalReceipt {
            provider_id,
            status: SubscriptionStatus::Active,
            subscription_start_date: start,
            subscription_end_date: end,
            months,
            payment,
        })
    }

    /// Flip every lapsed active subscription to expired; returns how many changed
    ///
    /// # Errors
    ///
    /// Returns a database error if the update fails
    pub async fn sweep_expired(&self) -> AppResult<u64> {
        let expired = self.database.expire_lapsed_providers(Utc::now()).await?;
        if expired > 0 {
            info!(expired, "Marked lapsed subscriptions as expired");
        }
        Ok(expired)
    }

    /// Subscription status of an active provider
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing or deleted providers, or a database error
    pub async fn get_status(&self, provider_id: i64) -> AppResult<SubscriptionStatusView> {
        let provider = self
            .database
            .get_active_provider(provider_id)
            .await?
            .ok_or_else(|| AppError::not_found("Service provider"))?;
        Ok(status_view(&provider, Utc::now()))
    }

    /// Sweep, then list every provider that needs to pay, earliest lapse first
    ///
    /// # Errors
    ///
    /// Returns a database error if the sweep or listing fails
    pub async fn list_pending(&self) -> AppResult<Vec<PendingProvider>> {
        self.sweep_expired().await?;
        let now = Utc::now();

        Ok(self
            .database
            .list_lapsed_providers(now)
            .await?
            .into_iter()
            .map(|provider| {
                let days_expired = provider
                    .subscription_end_date
                    .map_or(0, |end| ceil_days(now - end).max(0));
                PendingProvider {
                    provider,
                    message: EXPIRED_MESSAGE.to_owned(),
                    days_expired,
                }
            })
            .collect())
    }

    /// Run [`SubscriptionTracker::sweep_expired`] on a fixed interval until the process exits
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = tracker.sweep_expired().await {
                    warn!("Subscription sweep failed: {e}");
                }
            }
        })
    }
}
