// ABOUTME: HTTP tests for OTP issuance, verification and PIN reset routes
// ABOUTME: Covers code exposure settings and the verify-then-reset flow end to end
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use helpers::axum_test::AxumTestRequest;
use hojaega_server::server::HojaegaServer;
use serde_json::{json, Value};

#[tokio::test]
async fn test_pin_reset_otp_verifies_once() {
    let ctx = common::create_test_resources().await.unwrap();
    common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let issued = AxumTestRequest::post("/api/otp/request")
        .json(&json!({ "contactNo": "03001234567", "purpose": "PIN_RESET" }))
        .send(app.clone())
        .await;
    assert_eq!(issued.status(), 201);
    let issued: Value = issued.json();
    assert_eq!(issued["message"], "OTP generated");
    assert_eq!(issued["data"]["purpose"], "PIN_RESET");
    let code = issued["data"]["code"].as_str().unwrap().to_owned();

    let body = json!({ "contactNo": "03001234567", "purpose": "PIN_RESET", "code": code });
    let verified = AxumTestRequest::post("/api/otp/verify")
        .json(&body)
        .send(app.clone())
        .await;
    assert_eq!(verified.status(), 200);
    let verified: Value = verified.json();
    assert_eq!(verified["message"], "OTP verified");

    let replay = AxumTestRequest::post("/api/otp/verify")
        .json(&body)
        .send(app)
        .await;
    assert_eq!(replay.status(), 404);
    let replay: Value = replay.json();
    assert_eq!(replay["error"]["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_codes_hidden_when_exposure_disabled() {
    let mut config = common::test_config();
    config.otp.expose_codes = false;
    let ctx = common::create_test_resources_with(config).await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let issued = AxumTestRequest::post("/api/otp/request")
        .json(&json!({ "contactNo": "03111111111", "purpose": "SIGNUP" }))
        .send(app)
        .await;
    assert_eq!(issued.status(), 201);
    let issued: Value = issued.json();
    assert!(issued["data"].get("code").is_none());
    assert_eq!(issued["data"]["delivered"], true);
    assert!(common::last_code_sent_to(&ctx.sms, "03111111111").is_some());
}

#[tokio::test]
async fn test_wrong_code_is_unauthorized() {
    let ctx = common::create_test_resources().await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let issued = AxumTestRequest::post("/api/otp/request")
        .json(&json!({ "contactNo": "03222222222", "length": 4 }))
        .send(app.clone())
        .await;
    let issued: Value = issued.json();
    let code = issued["data"]["code"].as_str().unwrap();
    assert_eq!(code.len(), 4);
    let wrong = if code == "0000" { "1111" } else { "0000" };

    let response = AxumTestRequest::post("/api/otp/verify")
        .json(&json!({ "contactNo": "03222222222", "code": wrong }))
        .send(app)
        .await;
    assert_eq!(response.status(), 401);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_CODE");
}

#[tokio::test]
async fn test_forgot_password_resets_pin_and_consumes_code() {
    let ctx = common::create_test_resources().await.unwrap();
    common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let issued = AxumTestRequest::post("/api/otp/request")
        .json(&json!({ "contactNo": "03001234567", "purpose": "PIN_RESET" }))
        .send(app.clone())
        .await;
    let issued: Value = issued.json();
    let code = issued["data"]["code"].as_str().unwrap().to_owned();

    let bad_pin = AxumTestRequest::post("/api/forgot-password")
        .json(&json!({ "contactNo": "03001234567", "code": code, "newPin": "12" }))
        .send(app.clone())
        .await;
    assert_eq!(bad_pin.status(), 400);

    let reset = AxumTestRequest::post("/api/forgot-password")
        .json(&json!({ "contactNo": "03001234567", "code": code, "newPin": "9876" }))
        .send(app.clone())
        .await;
    assert_eq!(reset.status(), 200);
    let reset: Value = reset.json();
    assert_eq!(reset["message"], "PIN reset successfully");
    assert_eq!(reset["data"]["userType"], "service_provider");

    let again = AxumTestRequest::post("/api/forgot-password")
        .json(&json!({ "contactNo": "03001234567", "code": code, "newPin": "5555" }))
        .send(app.clone())
        .await;
    assert_eq!(again.status(), 404);

    let old_pin = AxumTestRequest::post("/api/sp-signin")
        .json(&json!({ "contactNo": "03001234567", "pin": "1234" }))
        .send(app.clone())
        .await;
    assert_eq!(old_pin.status(), 401);

    let new_pin = AxumTestRequest::post("/api/sp-signin")
        .json(&json!({ "contactNo": "03001234567", "pin": "9876" }))
        .send(app)
        .await;
    assert_eq!(new_pin.status(), 200);
    let new_pin: Value = new_pin.json();
    assert_eq!(new_pin["message"], "Service provider signed in successfully");
}
