// ABOUTME: Secret handling for PINs and one-time codes: bcrypt hashing and random code generation
// ABOUTME: Also normalizes contact numbers to the digit form used for matching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk

use crate::constants::accounts::{MAX_PHONE_DIGITS, MIN_PHONE_DIGITS, PIN_LENGTH};
use crate::errors::{AppError, AppResult};
use rand::rngs::OsRng;
use rand::Rng;

/// bcrypt hasher with a configurable work factor
///
/// Hashing and verification run on the blocking pool so they never stall
/// the async executor.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    /// Create a hasher with the given bcrypt cost
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Configured bcrypt cost
    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a secret
    ///
    /// # Errors
    ///
    /// Returns an error if bcrypt fails or the blocking task panics
    pub async fn hash(&self, secret: &str) -> AppResult<String> {
        let secret = secret.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(secret, cost))
            .await
            .map_err(|e| AppError::internal(format!("Hashing task failed: {e}")))?
            .map_err(|e| AppError::internal(format!("Failed to hash secret: {e}")))
    }

    /// Check a secret against a stored hash; malformed hashes never match
    pub async fn verify(&self, secret: &str, hash: &str) -> bool {
        let secret = secret.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || bcrypt::verify(&secret, &hash).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

/// Generate a numeric code of `length` digits from the OS random source
#[must_use]
pub fn generate_numeric_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Keep only the ASCII digits of a contact number
#[must_use]
pub fn normalize_contact(contact: &str) -> String {
    contact.chars().filter(char::is_ascii_digit).collect()
}

/// Validate a PIN: exactly four ASCII digits
///
/// # Errors
///
/// Returns `InvalidInput` when the PIN has the wrong shape
pub fn validate_pin(pin: &str) -> AppResult<()> {
    if pin.len() == PIN_LENGTH && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::invalid_input(format!(
            "PIN must be exactly {PIN_LENGTH} digits"
        )))
    }
}

/// Whether a provider contact number is acceptable
///
/// Spaces, dashes and parentheses are ignored; what remains must be an
/// optional leading `+` followed by 10 to 15 digits.
#[must_use]
pub fn is_valid_phone(contact: &str) -> bool {
    let cleaned: String = contact
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
}
