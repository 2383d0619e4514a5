// ABOUTME: Integration tests for the OTP engine
// ABOUTME: Covers issuance, supersession, expiry, attempt limits and purging
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, Utc};
use hojaega_server::database::encode_timestamp;
use hojaega_server::errors::ErrorCode;
use hojaega_server::models::OtpPurpose;
use hojaega_server::services::otp::OtpRequest;

fn request(contact_no: &str, purpose: OtpPurpose) -> OtpRequest {
    OtpRequest {
        contact_no: contact_no.to_owned(),
        purpose,
        length: None,
        ttl_seconds: None,
    }
}

#[tokio::test]
async fn test_issued_code_is_texted_and_verifies_once() {
    let ctx = common::create_test_resources().await.unwrap();
    common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();

    let issued = ctx
        .resources
        .otp
        .request_otp(request("03001234567", OtpPurpose::PinReset))
        .await
        .unwrap();
    assert_eq!(issued.code.len(), 6);
    assert!(issued.delivered);
    assert_eq!(
        common::last_code_sent_to(&ctx.sms, "03001234567").as_deref(),
        Some(issued.code.as_str())
    );

    let verified = ctx
        .resources
        .otp
        .verify_otp("03001234567", OtpPurpose::PinReset, &issued.code)
        .await
        .unwrap();
    assert_eq!(verified.id, issued.id);

    let again = ctx
        .resources
        .otp
        .verify_otp("03001234567", OtpPurpose::PinReset, &issued.code)
        .await
        .unwrap_err();
    assert_eq!(again.code, ErrorCode::ResourceNotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_verify_succeeds_once() {
    let ctx = common::create_test_resources().await.unwrap();

    for round in 0..10 {
        let contact = format!("0300555{round:04}");
        let issued = ctx
            .resources
            .otp
            .request_otp(request(&contact, OtpPurpose::Generic))
            .await
            .unwrap();

        let attempts: Vec<_> = (0..2)
            .map(|_| {
                let resources = ctx.resources.clone();
                let contact = contact.clone();
                let code = issued.code.clone();
                tokio::spawn(async move {
                    resources
                        .otp
                        .verify_otp(&contact, OtpPurpose::Generic, &code)
                        .await
                })
            })
            .collect();
        let mut outcomes = Vec::new();
        for attempt in attempts {
            outcomes.push(attempt.await.unwrap());
        }

        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "round {round}: a code must verify exactly once");
        let loser = outcomes.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(loser.code, ErrorCode::ResourceNotFound);
    }
}

#[tokio::test]
async fn test_second_request_supersedes_first_code() {
    let ctx = common::create_test_resources().await.unwrap();
    let otp = &ctx.resources.otp;

    let first = otp
        .request_otp(request("03111111111", OtpPurpose::Signup))
        .await
        .unwrap();
    let second = otp
        .request_otp(request("03111111111", OtpPurpose::Signup))
        .await
        .unwrap();

    if first.code != second.code {
        let err = otp
            .verify_otp("03111111111", OtpPurpose::Signup, &first.code)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ResourceNotFound);

        let live = ctx.resources.database.get_otp_code(second.id).await.unwrap().unwrap();
        assert_eq!(live.attempts, 0, "superseded code must not cost an attempt");
    }

    otp.verify_otp("03111111111", OtpPurpose::Signup, &second.code)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_wrong_code_counts_attempt_and_stays_verifiable() {
    let ctx = common::create_test_resources().await.unwrap();
    let otp = &ctx.resources.otp;

    let issued = otp
        .request_otp(request("03222222222", OtpPurpose::Generic))
        .await
        .unwrap();
    let wrong = if issued.code == "000000" { "111111" } else { "000000" };

    let err = otp
        .verify_otp("03222222222", OtpPurpose::Generic, wrong)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidCode);

    let record = ctx.resources.database.get_otp_code(issued.id).await.unwrap().unwrap();
    assert_eq!(record.attempts, 1);
    assert!(record.consumed_at.is_none());

    otp.verify_otp("03222222222", OtpPurpose::Generic, &issued.code)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_attempt_limit_locks_code() {
    let ctx = common::create_test_resources().await.unwrap();
    let otp = &ctx.resources.otp;
    let max = ctx.resources.config.otp.max_attempts;

    let issued = otp
        .request_otp(request("03333333333", OtpPurpose::Generic))
        .await
        .unwrap();
    let wrong = if issued.code == "000000" { "111111" } else { "000000" };

    for _ in 0..max {
        let err = otp
            .verify_otp("03333333333", OtpPurpose::Generic, wrong)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCode);
    }

    let locked = otp
        .verify_otp("03333333333", OtpPurpose::Generic, &issued.code)
        .await
        .unwrap_err();
    assert_eq!(locked.code, ErrorCode::AttemptsExceeded);
    assert_eq!(locked.http_status(), 429);
}

#[tokio::test]
async fn test_expired_code_is_rejected_and_left_unconsumed() {
    let ctx = common::create_test_resources().await.unwrap();
    let otp = &ctx.resources.otp;

    let issued = otp
        .request_otp(request("03444444444", OtpPurpose::Generic))
        .await
        .unwrap();

    sqlx::query("UPDATE otp_codes SET expires_at = $1 WHERE id = $2")
        .bind(encode_timestamp(Utc::now() - Duration::minutes(1)))
        .bind(issued.id)
        .execute(ctx.resources.database.pool())
        .await
        .unwrap();

    let err = otp
        .verify_otp("03444444444", OtpPurpose::Generic, &issued.code)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::TokenExpired);

    let record = ctx.resources.database.get_otp_code(issued.id).await.unwrap().unwrap();
    assert!(record.consumed_at.is_none());
}

#[tokio::test]
async fn test_account_bound_purposes_require_an_account() {
    let ctx = common::create_test_resources().await.unwrap();

    let err = ctx
        .resources
        .otp
        .request_otp(request("03555555555", OtpPurpose::PinReset))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResourceNotFound);
    assert!(ctx.sms.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_contact_is_rejected() {
    let ctx = common::create_test_resources().await.unwrap();

    let err = ctx
        .resources
        .otp
        .request_otp(request("12ab", OtpPurpose::Generic))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFormat);
}

#[tokio::test]
async fn test_purge_removes_consumed_codes() {
    let ctx = common::create_test_resources().await.unwrap();
    let otp = &ctx.resources.otp;

    let issued = otp
        .request_otp(request("03666666666", OtpPurpose::Generic))
        .await
        .unwrap();
    otp.verify_otp("03666666666", OtpPurpose::Generic, &issued.code)
        .await
        .unwrap();

    let purged = otp.purge_stale(Duration::zero()).await.unwrap();
    assert_eq!(purged, 1);
    assert!(ctx
        .resources
        .database
        .get_otp_code(issued.id)
        .await
        .unwrap()
        .is_none());
}
