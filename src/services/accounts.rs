// ABOUTME: Provider and consumer account management: signup, profile edits, search, sign-in and PIN reset
// ABOUTME: Validates input, hashes PINs and grants new providers their first subscription month
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::constants::accounts::{MAX_NAME_LENGTH, MIN_NAME_LENGTH, MIN_SKILLSET_LENGTH};
use crate::constants::subscription::SIGNUP_GRANT_MONTHS;
use crate::credentials::{is_valid_phone, normalize_contact, validate_pin, CredentialHasher};
use crate::database::consumers::{update_consumer_pin, NewConsumer};
use crate::database::providers::{update_provider_pin, NewProvider};
use crate::database::{Database, ProviderFilter, ProviderGroupBy, ProviderUpdate};
use crate::errors::{AppError, AppResult};
use crate::logging::AppLogger;
use crate::models::{Consumer, OtpPurpose, Provider, UserType};
use crate::services::otp::{validate_otp_contact, OtpEngine};
use chrono::{Months, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Request field name
    pub field: &'static str,
    /// What is wrong with it
    pub message: String,
}

fn validation_failed(errors: Vec<FieldError>) -> AppResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(AppError::invalid_input("Validation failed").with_details(json!({ "errors": errors })))
}

fn check_bounded(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
    max: Option<usize>,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(FieldError {
            field,
            message: format!("{label} is required"),
        });
    } else if len < min {
        errors.push(FieldError {
            field,
            message: format!("{label} must be at least {min} characters long"),
        });
    } else if let Some(max) = max.filter(|max| len > *max) {
        errors.push(FieldError {
            field,
            message: format!("{label} cannot exceed {max} characters"),
        });
    }
}

fn check_contact(errors: &mut Vec<FieldError>, contact_no: &str) {
    if contact_no.trim().is_empty() {
        errors.push(FieldError {
            field: "contactNo",
            message: "Contact number is required".to_owned(),
        });
    } else if !is_valid_phone(contact_no) {
        errors.push(FieldError {
            field: "contactNo",
            message: "Please enter a valid contact number".to_owned(),
        });
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Provider signup request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSignup {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// City of operation
    #[serde(default)]
    pub city: String,
    /// Skills description
    #[serde(default)]
    pub skillset: String,
    /// Contact number
    #[serde(default)]
    pub contact_no: String,
    /// Optional four digit PIN
    #[serde(default)]
    pub pin: Option<String>,
    /// Optional profile description
    #[serde(default)]
    pub description: Option<String>,
    /// Optional experience summary
    #[serde(default)]
    pub experience: Option<String>,
}

/// Provider profile edit; absent fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfileUpdate {
    /// New display name
    pub name: Option<String>,
    /// New city
    pub city: Option<String>,
    /// New skills description
    pub skillset: Option<String>,
    /// New contact number
    pub contact_no: Option<String>,
    /// New four digit PIN
    pub pin: Option<String>,
    /// New profile description
    pub description: Option<String>,
    /// New experience summary
    pub experience: Option<String>,
}

/// Consumer signup request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerSignup {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Home city
    #[serde(default)]
    pub city: String,
    /// Four digit PIN
    #[serde(default)]
    pub pin: String,
    /// Optional contact number, needed for PIN resets
    #[serde(default)]
    pub contact_no: Option<String>,
}

/// Provider count for one city
#[derive(Debug, Clone, Serialize)]
pub struct CityCount {
    /// City name
    pub city: String,
    /// Active providers in the city
    pub count: i64,
}

/// Provider count for one skillset
#[derive(Debug, Clone, Serialize)]
pub struct SkillsetCount {
    /// Skillset text
    pub skillset: String,
    /// Active providers with this skillset
    pub count: i64,
}

/// Aggregate provider statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    /// Active providers
    pub total_providers: i64,
    /// Active providers per city
    pub by_city: Vec<CityCount>,
    /// Active providers per skillset
    pub by_skillset: Vec<SkillsetCount>,
}

/// Account whose PIN was reset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinResetOutcome {
    /// Account ID
    pub user_id: i64,
    /// Account kind
    pub user_type: UserType,
}

/// Account management operations
pub struct AccountService {
    database: Arc<Database>,
    hasher: CredentialHasher,
    otp: Arc<OtpEngine>,
}

impl AccountService {
    /// Create the service
    #[must_use]
    pub const fn new(database: Arc<Database>, hasher: CredentialHasher, otp: Arc<OtpEngine>) -> Self {
        Self {
            database,
            hasher,
            otp,
        }
    }

    /// Register a provider with a one month signup grant
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` with per-field details, `Conflict` when the
    /// contact number belongs to another active provider, or a database error
    pub async fn create_provider(&self, signup: ProviderSignup) -> AppResult<Provider> {
        let mut errors = Vec::new();
        check_bounded(&mut errors, "name", "Name", &signup.name, MIN_NAME_LENGTH, Some(MAX_NAME_LENGTH));
        check_bounded(&mut errors, "city", "City", &signup.city, MIN_NAME_LENGTH, Some(MAX_NAME_LENGTH));
        check_bounded(&mut errors, "skillset", "Skillset", &signup.skillset, MIN_SKILLSET_LENGTH, None);
        check_contact(&mut errors, &signup.contact_no);
        validation_failed(errors)?;

        let pin = non_blank(signup.pin);
        if let Some(pin) = &pin {
            validate_pin(pin)?;
        }

        let contact_no = signup.contact_no.trim().to_owned();
        let contact_digits = normalize_contact(&contact_no);
        if self
            .database
            .provider_contact_in_use(&contact_digits, None)
            .await?
        {
            return Err(AppError::conflict(
                "Service provider with this contact number already exists",
            ));
        }

        let pin_hash = match pin {
            Some(pin) => Some(self.hasher.hash(&pin).await?),
            None => None,
        };

        let start = Utc::now().trunc_subsecs(6);
        let end = start
            .checked_add_months(Months::new(SIGNUP_GRANT_MONTHS))
            .ok_or_else(|| AppError::internal("Subscription end date out of range"))?;

        let provider = self
            .database
            .create_provider(&NewProvider {
                name: signup.name.trim().to_owned(),
                city: signup.city.trim().to_owned(),
                skillset: signup.skillset.trim().to_owned(),
                description: non_blank(signup.description),
                experience: non_blank(signup.experience),
                contact_no,
                contact_digits,
                pin_hash,
                subscription_start_date: start,
                subscription_end_date: end,
            })
            .await?;

        AppLogger::log_subscription_event(provider.id, "signup_grant", &format!("until {end}"));
        Ok(provider)
    }

    /// Active providers, newest first
    ///
    /// # Errors
    ///
    /// Returns a database error
    pub async fn list_providers(&self) -> AppResult<Vec<Provider>> {
        self.database.list_active_providers().await
    }

    /// An active provider
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for missing or deleted providers
    pub async fn get_provider(&self, id: i64) -> AppResult<Provider> {
        self.database
            .get_active_provider(id)
            .await?
            .ok_or_else(|| AppError::not_found("Service provider"))
    }

    /// Edit an active provider's profile
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `InvalidInput` with per-field details, `Conflict`
    /// for a contact number already in use, or a database error
    pub async fn update_provider(
        &self,
        id: i64,
        update: ProviderProfileUpdate,
    ) -> AppResult<Provider> {
        self.get_provider(id).await?;

        let mut errors = Vec::new();
        if let Some(name) = &update.name {
            check_bounded(&mut errors, "name", "Name", name, MIN_NAME_LENGTH, Some(MAX_NAME_LENGTH));
        }
        if let Some(city) = &update.city {
            check_bounded(&mut errors, "city", "City", city, MIN_NAME_LENGTH, Some(MAX_NAME_LENGTH));
        }
        if let Some(skillset) = &update.skillset {
            check_bounded(&mut errors, "skillset", "Skillset", skillset, MIN_SKILLSET_LENGTH, None);
        }
        if let Some(contact_no) = &update.contact_no {
            check_contact(&mut errors, contact_no);
        }
        validation_failed(errors)?;

        let pin = non_blank(update.pin);
        if let Some(pin) = &pin {
            validate_pin(pin)?;
        }

        let contact = match update.contact_no {
            Some(contact_no) => {
                let contact_no = contact_no.trim().to_owned();
                let digits = normalize_contact(&contact_no);
                if self
                    .database
                    .provider_contact_in_use(&digits, Some(id))
                    .await?
                {
                    return Err(AppError::conflict(
                        "Service provider with this contact number already exists",
                    ));
                }
                Some((contact_no, digits))
            }
            None => None,
        };

        let pin_hash = match pin {
            Some(pin) => Some(self.hasher.hash(&pin).await?),
            None => None,
        };

        self.database
            .update_provider(
                id,
                &ProviderUpdate {
                    name: update.name.map(|v| v.trim().to_owned()),
                    city: update.city.map(|v| v.trim().to_owned()),
                    skillset: update.skillset.map(|v| v.trim().to_owned()),
                    description: non_blank(update.description),
                    experience: non_blank(update.experience),
                    contact,
                    pin_hash,
                },
            )
            .await?
            .ok_or_else(|| AppError::not_found("Service provider"))
    }

    /// Soft-delete a provider
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the provider is missing or already deleted
    pub async fn delete_provider(&self, id: i64) -> AppResult<()> {
        if self.database.deactivate_provider(id).await? {
            AppLogger::log_subscription_event(id, "deactivated", "provider soft-deleted");
            Ok(())
        } else {
            Err(AppError::not_found("Service provider"))
        }
    }

    /// Search active providers
    ///
    /// # Errors
    ///
    /// Returns a database error
    pub async fn filter_providers(&self, filter: &ProviderFilter) -> AppResult<Vec<Provider>> {
        self.database.filter_providers(filter).await
    }

    /// Provider totals grouped by city and skillset
    ///
    /// # Errors
    ///
    /// Returns a database error
    pub async fn provider_stats(&self) -> AppResult<ProviderStats> {
        let total_providers = self.database.count_active_providers().await?;
        let by_city = self
            .database
            .count_providers_grouped(ProviderGroupBy::City)
            .await?
            .into_iter()
            .map(|(city, count)| CityCount { city, count })
            .collect();
        let by_skillset = self
            .database
            .count_providers_grouped(ProviderGroupBy::Skillset)
            .await?
            .into_iter()
            .map(|(skillset, count)| SkillsetCount { skillset, count })
            .collect();

        Ok(ProviderStats {
            total_providers,
            by_city,
            by_skillset,
        })
    }

    /// Cities with at least one active provider
    ///
    /// # Errors
    ///
    /// Returns a database error
    pub async fn cities(&self) -> AppResult<Vec<String>> {
        self.database.distinct_provider_cities().await
    }

    async fn provider_for_sign_in(&self, contact_no: &str) -> AppResult<Provider> {
        let digits = normalize_contact(contact_no);
        self.database
            .find_active_provider_by_contact(&digits)
            .await?
            .filter(|p| !digits.is_empty() && p.contact_digits == digits)
            .ok_or_else(|| {
                AppLogger::log_auth_event(UserType::ServiceProvider.as_str(), 0, "sign_in_unknown_contact", false);
                AppError::auth_invalid("Invalid credentials")
            })
    }

    /// Sign a provider in with contact number and PIN
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed PIN and `AuthInvalid` for an
    /// unknown contact or wrong PIN
    pub async fn sign_in_provider(&self, contact_no: &str, pin: &str) -> AppResult<Provider> {
        if contact_no.trim().is_empty() {
            return Err(AppError::missing_field("contactNo"));
        }
        validate_pin(pin)?;

        let provider = self.provider_for_sign_in(contact_no).await?;
        let matches = match &provider.pin_hash {
            Some(hash) => self.hasher.verify(pin, hash).await,
            None => false,
        };

        AppLogger::log_auth_event(UserType::ServiceProvider.as_str(), provider.id, "sign_in_pin", matches);
        if matches {
            Ok(provider)
        } else {
            Err(AppError::auth_invalid("Invalid credentials"))
        }
    }

    /// Sign a provider in with a code issued for `SP_SIGNIN`
    ///
    /// # Errors
    ///
    /// Returns `AuthInvalid` for an unknown contact or any OTP verification failure
    pub async fn sign_in_provider_with_otp(&self, contact_no: &str, code: &str) -> AppResult<Provider> {
        let contact_no = validate_otp_contact(contact_no)?;
        let provider = self.provider_for_sign_in(&contact_no).await?;
        let verified = self.otp.verify_otp(&contact_no, OtpPurpose::SpSignin, code).await;

        AppLogger::log_auth_event(UserType::ServiceProvider.as_str(), provider.id, "sign_in_otp", verified.is_ok());
        verified?;
        Ok(provider)
    }

    /// Register a consumer
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank fields, a malformed PIN or contact,
    /// `Conflict` when the name and city pair is taken, or a database error
    pub async fn create_consumer(&self, signup: ConsumerSignup) -> AppResult<Consumer> {
        let name = signup.name.trim().to_owned();
        let city = signup.city.trim().to_owned();
        if name.is_empty() {
            return Err(AppError::missing_field("name"));
        }
        if city.is_empty() {
            return Err(AppError::missing_field("city"));
        }
        validate_pin(signup.pin.trim())?;

        let contact = match non_blank(signup.contact_no) {
            Some(contact_no) if is_valid_phone(&contact_no) => {
                let digits = normalize_contact(&contact_no);
                Some((contact_no, digits))
            }
            Some(_) => {
                return Err(AppError::invalid_input("Please enter a valid contact number"));
            }
            None => None,
        };

        if self.database.consumer_exists(&name, &city).await? {
            return Err(AppError::conflict(
                "A consumer with this name and city already exists",
            ));
        }

        let pin_hash = self.hasher.hash(signup.pin.trim()).await?;
        let consumer = self
            .database
            .create_consumer(&NewConsumer {
                name,
                city,
                contact,
                pin_hash,
            })
            .await?;

        AppLogger::log_auth_event(UserType::Consumer.as_str(), consumer.id, "signup", true);
        Ok(consumer)
    }

    /// Replace an account's PIN after verifying a `PIN_RESET` code
    ///
    /// Verification, PIN update and code consumption commit together; a
    /// failed verification still records the attempt.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a malformed PIN, `NotFound` when no account
    /// uses the contact, any OTP verification failure, or a database error
    pub async fn reset_pin(
        &self,
        contact_no: &str,
        code: &str,
        new_pin: &str,
        user_type: Option<UserType>,
    ) -> AppResult<PinResetOutcome> {
        let contact_no = validate_otp_contact(contact_no)?;
        validate_pin(new_pin)?;

        let digits = normalize_contact(&contact_no);
        let provider = if user_type == Some(UserType::Consumer) {
            None
        } else {
            self.database.find_active_provider_by_contact(&digits).await?
        };
        let account = match provider {
            Some(provider) => (provider.id, UserType::ServiceProvider),
            None if user_type != Some(UserType::ServiceProvider) => self
                .database
                .find_consumer_by_contact(&digits)
                .await?
                .map(|consumer| (consumer.id, UserType::Consumer))
                .ok_or_else(|| AppError::not_found("Account with this contact number"))?,
            None => return Err(AppError::not_found("Account with this contact number")),
        };
        let (user_id, user_type) = account;

        let pin_hash = self.hasher.hash(new_pin).await?;

        let mut tx = self.database.begin().await?;
        if let Err(e) = self
            .otp
            .verify_otp_in(&mut tx, &contact_no, OtpPurpose::PinReset, code)
            .await
        {
            tx.commit().await.map_err(|e| {
                AppError::database(format!("Failed to commit OTP verification: {e}"))
            })?;
            AppLogger::log_auth_event(user_type.as_str(), user_id, "pin_reset", false);
            return Err(e);
        }

        match user_type {
            UserType::ServiceProvider => update_provider_pin(&mut tx, user_id, &pin_hash).await?,
            UserType::Consumer => update_consumer_pin(&mut tx, user_id, &pin_hash).await?,
        }
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit PIN reset: {e}")))?;

        AppLogger::log_auth_event(user_type.as_str(), user_id, "pin_reset", true);
        Ok(PinResetOutcome { user_id, user_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_bounded_reports_each_rule() {
        let mut errors = Vec::new();
        check_bounded(&mut errors, "name", "Name", "  ", 2, Some(100));
        check_bounded(&mut errors, "city", "City", "L", 2, Some(100));
        check_bounded(&mut errors, "skillset", "Skillset", "Plumbing", 5, None);
        check_bounded(&mut errors, "name", "Name", &"x".repeat(101), 2, Some(100));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].message, "Name is required");
        assert_eq!(errors[1].message, "City must be at least 2 characters long");
        assert_eq!(errors[2].message, "Name cannot exceed 100 characters");
    }

    #[test]
    fn test_validation_failed_carries_field_list() {
        let err = validation_failed(vec![FieldError {
            field: "contactNo",
            message: "Please enter a valid contact number".to_owned(),
        }])
        .unwrap_err();

        assert_eq!(err.message, "Validation failed");
        assert_eq!(err.details["errors"][0]["field"], "contactNo");
        assert!(validation_failed(Vec::new()).is_ok());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ".to_owned())), Some("x".to_owned()));
        assert_eq!(non_blank(Some("   ".to_owned())), None);
        assert_eq!(non_blank(None), None);
    }
}
