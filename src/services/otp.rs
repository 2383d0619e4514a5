// ABOUTME: One-time passcode engine: issuance with supersede semantics and bounded verification
// ABOUTME: Hashes codes with bcrypt, gates purposes on account existence and hands codes to SMS
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

//! # OTP Engine
//!
//! At most one live code exists per (contact, purpose). Issuing a new code
//! supersedes the previous ones in the same transaction; a superseded code
//! never verifies and is reported as not found. Failed verifications are
//! counted on the live code and lock it once the configured maximum is hit.

use crate::constants::otp::{
    DEFAULT_CODE_LENGTH, DEFAULT_TTL_SECS, MAX_CODE_LENGTH, MAX_CONTACT_DIGITS, MAX_TTL_SECS,
    MIN_CODE_LENGTH, MIN_CONTACT_DIGITS, MIN_TTL_SECS, SUPERSEDED_LOOKBACK,
};
use crate::credentials::{generate_numeric_code, CredentialHasher};
use crate::database::{otp_codes, Database};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::{mask_contact, AppLogger};
use crate::models::{OtpCode, OtpPurpose};
use crate::notifications::SmsSender;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{info, warn};

/// Parameters of an OTP request
#[derive(Debug, Clone)]
pub struct OtpRequest {
    /// Contact number, 6 to 15 digits
    pub contact_no: String,
    /// Scope of the code
    pub purpose: OtpPurpose,
    /// Requested code length, clamped to 4..=8
    pub length: Option<usize>,
    /// Requested validity in seconds, clamped to 60..=900
    pub ttl_seconds: Option<i64>,
}

/// A freshly issued code
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    /// Record ID
    pub id: i64,
    /// Contact number the code was issued for
    pub contact_no: String,
    /// Scope of the code
    pub purpose: OtpPurpose,
    /// End of validity
    pub expires_at: DateTime<Utc>,
    /// Plaintext code; only ever returned to callers in development
    #[serde(skip)]
    pub code: String,
    /// Whether the SMS gateway accepted the message
    pub delivered: bool,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerified {
    /// Record ID of the consumed code
    pub id: i64,
    /// Contact number that was verified
    pub contact_no: String,
    /// Scope of the code
    pub purpose: OtpPurpose,
    /// Time the code was consumed
    pub verified_at: DateTime<Utc>,
}

/// Issues and verifies one-time passcodes
pub struct OtpEngine {
    database: Arc<Database>,
    hasher: CredentialHasher,
    sms: Arc<dyn SmsSender>,
    max_attempts: u32,
}

/// Validate the shape of a contact number accepted by the OTP endpoints
///
/// # Errors
///
/// Returns `MissingRequiredField` when empty and `InvalidFormat` when not 6 to 15 digits
pub fn validate_otp_contact(contact_no: &str) -> AppResult<String> {
    let contact = contact_no.trim();
    if contact.is_empty() {
        return Err(AppError::missing_field("contactNo"));
    }
    if !(MIN_CONTACT_DIGITS..=MAX_CONTACT_DIGITS).contains(&contact.len())
        || !contact.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AppError::new(
            ErrorCode::InvalidFormat,
            format!("contactNo must be {MIN_CONTACT_DIGITS}-{MAX_CONTACT_DIGITS} digits"),
        ));
    }
    Ok(contact.to_owned())
}

/// Code length after applying the default and bounds
#[must_use]
pub fn effective_length(requested: Option<usize>) -> usize {
    requested
        .filter(|len| *len > 0)
        .unwrap_or(DEFAULT_CODE_LENGTH)
        .clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH)
}

/// Validity window after applying the default and bounds
#[must_use]
pub fn effective_ttl(requested: Option<i64>) -> Duration {
    Duration::seconds(
        requested
            .filter(|ttl| *ttl > 0)
            .unwrap_or(DEFAULT_TTL_SECS)
            .clamp(MIN_TTL_SECS, MAX_TTL_SECS),
    )
}

fn sms_text(code: &str, ttl: Duration) -> String {
    format!(
        "Your Hojaega verification code is {code}. It expires in {} minutes.",
        ttl.num_minutes().max(1)
    )
}

impl OtpEngine {
    /// Create an engine
    #[must_use]
    pub fn new(
        database: Arc<Database>,
        hasher: CredentialHasher,
        sms: Arc<dyn SmsSender>,
        max_attempts: u32,
    ) -> Self {
        Self {
            database,
            hasher,
            sms,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Failed verifications tolerated per code
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    async fn account_exists(&self, contact_no: &str) -> AppResult<bool> {
        if self
            .database
            .find_active_provider_by_contact(contact_no)
            .await?
            .is_some()
        {
            return Ok(true);
        }
        Ok(self
            .database
            .find_consumer_by_contact(contact_no)
            .await?
            .is_some())
    }

    /// Issue a new code for (contact, purpose), superseding any live one
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for a malformed contact, `NotFound` when the
    /// purpose needs an account and none exists, `Conflict` when it must not
    /// exist but does, or a database error
    pub async fn request_otp(&self, request: OtpRequest) -> AppResult<OtpIssued> {
        let contact_no = validate_otp_contact(&request.contact_no)?;
        let purpose = request.purpose;
        let length = effective_length(request.length);
        let ttl = effective_ttl(request.ttl_seconds);

        let exists = self.account_exists(&contact_no).await?;
        if purpose.requires_existing_account() && !exists {
            AppLogger::log_otp_event(&contact_no, purpose.as_str(), "request_no_account", false);
            return Err(AppError::not_found("Account with this contact number"));
        }
        if !purpose.requires_existing_account() && exists {
            AppLogger::log_otp_event(&contact_no, purpose.as_str(), "request_account_exists", false);
            return Err(AppError::conflict(
                "Account with this contact number already exists",
            ));
        }

        let code = generate_numeric_code(length);
        let code_hash = self.hasher.hash(&code).await?;
        let now = Utc::now().trunc_subsecs(6);
        let expires_at = now + ttl;

        let mut tx = self.database.begin().await?;
        let superseded = otp_codes::supersede_live(&mut tx, &contact_no, purpose, now).await?;
        let id =
            otp_codes::insert_code(&mut tx, &contact_no, purpose, &code_hash, now, expires_at)
                .await?;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit OTP request: {e}")))?;

        if superseded > 0 {
            info!(
                otp.contact = %mask_contact(&contact_no),
                otp.purpose = %purpose,
                superseded,
                "Superseded previous OTP codes"
            );
        }

        let delivered = match self.sms.send(&contact_no, &sms_text(&code, ttl)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    otp.contact = %mask_contact(&contact_no),
                    sms.gateway = self.sms.name(),
                    "Failed to deliver OTP by SMS: {e}"
                );
                false
            }
        };

        AppLogger::log_otp_event(&contact_no, purpose.as_str(), "issued", true);

        Ok(OtpIssued {
            id,
            contact_no,
            purpose,
            expires_at,
            code,
            delivered,
        })
    }

    /// Verify a code and consume it on success
    ///
    /// Failed attempts are committed even though the call returns an error.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `Expired`, `AttemptsExceeded` or `InvalidCode` as
    /// described on [`OtpEngine::verify_otp_in`]
    pub async fn verify_otp(
        &self,
        contact_no: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> AppResult<OtpVerified> {
        let contact_no = validate_otp_contact(contact_no)?;
        let mut tx = self.database.begin().await?;
        let outcome = self.verify_otp_in(&mut tx, &contact_no, purpose, code).await;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit OTP verification: {e}")))?;

        let record = outcome?;
        Ok(OtpVerified {
            id: record.id,
            contact_no: record.contact_no,
            purpose: record.purpose,
            verified_at: record.consumed_at.unwrap_or_else(Utc::now),
        })
    }

    /// Verify and consume a code on the caller's transaction
    ///
    /// Checks run in this order: no live code is `NotFound`, a lapsed code is
    /// `Expired` (left unconsumed), a locked code is `AttemptsExceeded`. A
    /// mismatch that equals a recently superseded code is `NotFound` without
    /// touching the live code; any other mismatch counts an attempt and is
    /// `InvalidCode`.
    ///
    /// # Errors
    ///
    /// Returns the verification failure or a database error
    pub async fn verify_otp_in(
        &self,
        conn: &mut SqliteConnection,
        contact_no: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> AppResult<OtpCode> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::missing_field("code"));
        }

        let Some(mut record) = otp_codes::latest_live(conn, contact_no, purpose).await? else {
            AppLogger::log_otp_event(contact_no, purpose.as_str(), "verify_no_code", false);
            return Err(AppError::not_found("Active OTP"));
        };

        let now = Utc::now().trunc_subsecs(6);
        if record.is_expired_at(now) {
            AppLogger::log_otp_event(contact_no, purpose.as_str(), "verify_expired", false);
            return Err(AppError::expired("OTP expired"));
        }

        if record.attempts >= self.max_attempts {
            AppLogger::log_security_event(
                "otp_attempts_exceeded",
                "medium",
                &format!("contact={} purpose={purpose}", mask_contact(contact_no)),
            );
            return Err(AppError::attempts_exceeded(self.max_attempts));
        }

        if !self.hasher.verify(code, &record.code_hash).await {
            let superseded =
                otp_codes::recently_superseded(conn, contact_no, purpose, SUPERSEDED_LOOKBACK)
                    .await?;
            for old in &superseded {
                if self.hasher.verify(code, &old.code_hash).await {
                    AppLogger::log_otp_event(
                        contact_no,
                        purpose.as_str(),
                        "verify_superseded",
                        false,
                    );
                    return Err(AppError::not_found("Active OTP"));
                }
            }

            otp_codes::record_failed_attempt(conn, record.id).await?;
            AppLogger::log_otp_event(contact_no, purpose.as_str(), "verify_mismatch", false);
            return Err(AppError::invalid_code("Invalid OTP"));
        }

        if !otp_codes::consume(conn, record.id, now).await? {
            return Err(AppError::not_found("Active OTP"));
        }

        record.consumed_at = Some(now);
        record.attempts = record.attempts.saturating_add(1);
        AppLogger::log_otp_event(contact_no, purpose.as_str(), "verified", true);
        Ok(record)
    }

    /// Delete codes that stopped mattering more than `retention` ago
    ///
    /// # Errors
    ///
    /// Returns a database error if the purge fails
    pub async fn purge_stale(&self, retention: Duration) -> AppResult<u64> {
        let purged = self.database.purge_otp_codes(Utc::now() - retention).await?;
        if purged > 0 {
            info!(purged, "Purged stale OTP codes");
        }
        Ok(purged)
    }

    /// Run [`OtpEngine::purge_stale`] on a fixed interval until the process exits
    pub fn spawn_purger(
        self: &Arc<Self>,
        every: std::time::Duration,
        retention: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = engine.purge_stale(retention).await {
                    warn!("OTP purge failed: {e}");
                }
            }
        })
    }
}
