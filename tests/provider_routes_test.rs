// ABOUTME: HTTP tests for provider, consumer and health routes
// ABOUTME: Exercises signup, search, statistics, sign-in and subscription payment endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::Router;
use chrono::{Duration, Utc};
use helpers::axum_test::AxumTestRequest;
use hojaega_server::server::HojaegaServer;
use serde_json::{json, Value};

async fn setup() -> (common::TestContext, Router) {
    let ctx = common::create_test_resources().await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    (ctx, app)
}

fn signup_body(name: &str, city: &str, contact: &str) -> Value {
    json!({
        "name": name,
        "city": city,
        "skillset": "Electrical wiring and repairs",
        "contactNo": contact,
        "pin": "2468",
        "experience": "5 years",
    })
}

#[tokio::test]
async fn test_create_provider_and_duplicate_contact() {
    let (_ctx, app) = setup().await;

    let created = AxumTestRequest::post("/api/sp-create")
        .json(&signup_body("Bilal Electric", "Karachi", "0300-1112223"))
        .send(app.clone())
        .await;
    assert_eq!(created.status(), 201);
    let created: Value = created.json();
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["name"], "Bilal Electric");
    assert_eq!(created["data"]["status"], 1);
    assert!(created["data"].get("pinHash").is_none());
    assert!(created["data"]["subscriptionEndDate"].is_string());

    let duplicate = AxumTestRequest::post("/api/sp-create")
        .json(&signup_body("Another Name", "Lahore", "03001112223"))
        .send(app)
        .await;
    assert_eq!(duplicate.status(), 409);
    let duplicate: Value = duplicate.json();
    assert_eq!(duplicate["error"]["code"], "RESOURCE_ALREADY_EXISTS");
}

#[tokio::test]
async fn test_create_provider_reports_field_errors() {
    let (_ctx, app) = setup().await;

    let response = AxumTestRequest::post("/api/sp-create")
        .json(&json!({ "name": "A", "city": "Lahore", "skillset": "Wiring", "contactNo": "" }))
        .send(app)
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    let fields: Vec<&str> = body["error"]["details"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"contactNo"));
    assert!(!fields.contains(&"city"));
}

#[tokio::test]
async fn test_list_get_update_delete_provider() {
    let (ctx, app) = setup().await;
    let first = common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();
    common::create_provider(&ctx.resources, "Usman Carpenter", "Karachi", "03009998887")
        .await
        .unwrap();

    let listed: Value = AxumTestRequest::get("/api/sp-list").send(app.clone()).await.json();
    assert_eq!(listed["count"], 2);

    let fetched = AxumTestRequest::get(&format!("/api/sp-get/{}", first.id))
        .send(app.clone())
        .await;
    assert_eq!(fetched.status(), 200);
    let fetched: Value = fetched.json();
    assert_eq!(fetched["data"]["contactNo"], "03001234567");

    let updated = AxumTestRequest::put(&format!("/api/sp-update/{}", first.id))
        .json(&json!({ "city": "Islamabad", "description": "Available weekends" }))
        .send(app.clone())
        .await;
    assert_eq!(updated.status(), 200);
    let updated: Value = updated.json();
    assert_eq!(updated["data"]["city"], "Islamabad");
    assert_eq!(updated["data"]["name"], "Ali Plumber");
    assert_eq!(updated["data"]["description"], "Available weekends");

    let deleted = AxumTestRequest::delete(&format!("/api/sp-delete/{}", first.id))
        .send(app.clone())
        .await;
    assert_eq!(deleted.status(), 200);

    let gone = AxumTestRequest::get(&format!("/api/sp-get/{}", first.id))
        .send(app.clone())
        .await;
    assert_eq!(gone.status(), 404);

    let listed: Value = AxumTestRequest::get("/api/sp-list").send(app.clone()).await.json();
    assert_eq!(listed["count"], 1);

    let missing = AxumTestRequest::get("/api/sp-get/99999").send(app).await;
    assert_eq!(missing.status(), 404);
}

#[tokio::test]
async fn test_filter_stats_and_cities() {
    let (ctx, app) = setup().await;
    common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();
    common::create_provider(&ctx.resources, "Hamza Pipes", "Lahore", "03001234568")
        .await
        .unwrap();
    common::create_provider(&ctx.resources, "Usman Fitter", "Karachi", "03001234569")
        .await
        .unwrap();

    let filtered: Value = AxumTestRequest::post("/api/sp-filter")
        .json(&json!({ "city": "lahore" }))
        .send(app.clone())
        .await
        .json();
    assert_eq!(filtered["count"], 2);

    let searched: Value = AxumTestRequest::post("/api/sp-filter")
        .json(&json!({ "search": "usman", "city": "  " }))
        .send(app.clone())
        .await
        .json();
    assert_eq!(searched["count"], 1);
    assert_eq!(searched["data"][0]["name"], "Usman Fitter");

    let stats: Value = AxumTestRequest::get("/api/sp-stats").send(app.clone()).await.json();
    assert_eq!(stats["data"]["totalProviders"], 3);
    let lahore = stats["data"]["byCity"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["city"] == "Lahore")
        .unwrap();
    assert_eq!(lahore["count"], 2);

    let cities: Value = AxumTestRequest::get("/api/cities").send(app).await.json();
    assert_eq!(cities["data"], json!(["Karachi", "Lahore"]));
    assert_eq!(cities["count"], 2);
}

#[tokio::test]
async fn test_sign_in_with_pin() {
    let (ctx, app) = setup().await;
    common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();

    let ok = AxumTestRequest::post("/api/sp-signin")
        .json(&json!({ "contactNo": "0300 1234567", "pin": "1234" }))
        .send(app.clone())
        .await;
    assert_eq!(ok.status(), 200);
    let ok: Value = ok.json();
    assert_eq!(ok["data"]["name"], "Ali Plumber");

    let wrong = AxumTestRequest::post("/api/sp-signin")
        .json(&json!({ "contactNo": "03001234567", "pin": "0000" }))
        .send(app.clone())
        .await;
    assert_eq!(wrong.status(), 401);
    let wrong: Value = wrong.json();
    assert_eq!(wrong["error"]["code"], "AUTH_INVALID");

    let missing = AxumTestRequest::post("/api/sp-signin")
        .json(&json!({ "contactNo": "03001234567" }))
        .send(app)
        .await;
    assert_eq!(missing.status(), 400);
}

#[tokio::test]
async fn test_renew_status_and_pending() {
    let (ctx, app) = setup().await;
    let provider = common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();
    let now = Utc::now();
    common::set_provider_window(
        &ctx.resources,
        provider.id,
        now - Duration::days(40),
        now - Duration::days(3) + Duration::hours(1),
    )
    .await
    .unwrap();
    ctx.resources.subscriptions.sweep_expired().await.unwrap();

    let status: Value = AxumTestRequest::get(&format!("/api/sp-subscription-status/{}", provider.id))
        .send(app.clone())
        .await
        .json();
    assert_eq!(status["data"]["isExpired"], true);
    assert_eq!(status["data"]["status"], 0);
    assert_eq!(
        status["message"],
        "Subscription period ended. Please complete your payment to continue services."
    );

    let pending: Value = AxumTestRequest::get("/api/sp-pending").send(app.clone()).await.json();
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["message"], "Found 1 service providers with expired subscriptions");
    assert_eq!(pending["data"][0]["daysExpired"], 3);

    let out_of_range = AxumTestRequest::post(&format!("/api/sp-renew-subscription/{}", provider.id))
        .json(&json!({ "months": 0, "screenshot": "uploads/receipt.png" }))
        .send(app.clone())
        .await;
    assert_eq!(out_of_range.status(), 400);

    let renewed = AxumTestRequest::post(&format!("/api/sp-renew-subscription/{}", provider.id))
        .json(&json!({ "months": 3, "screenshot": "uploads/receipt.png", "amount": 1500 }))
        .send(app.clone())
        .await;
    assert_eq!(renewed.status(), 200);
    let renewed: Value = renewed.json();
    assert_eq!(renewed["message"], "Subscription renewed successfully for 3 month(s)");
    assert_eq!(renewed["data"]["status"], 1);
    assert_eq!(renewed["data"]["payment"]["months"], 3);

    let pending: Value = AxumTestRequest::get("/api/sp-pending").send(app.clone()).await.json();
    assert_eq!(pending["count"], 0);

    let status: Value = AxumTestRequest::get(&format!("/api/sp-subscription-status/{}", provider.id))
        .send(app)
        .await
        .json();
    assert_eq!(status["data"]["isExpired"], false);
    assert!(status["data"]["daysUntilExpiry"].as_i64().unwrap() >= 89);
}

#[tokio::test]
async fn test_payment_upload() {
    let (ctx, app) = setup().await;
    let provider = common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();

    let invalid = AxumTestRequest::post("/api/payment-upload")
        .json(&json!({ "serviceProviderId": provider.id, "amount": -5, "screenshot": "a.png" }))
        .send(app.clone())
        .await;
    assert_eq!(invalid.status(), 400);

    let no_proof = AxumTestRequest::post("/api/payment-upload")
        .json(&json!({ "serviceProviderId": provider.id, "amount": 1000 }))
        .send(app.clone())
        .await;
    assert_eq!(no_proof.status(), 400);

    let unknown = AxumTestRequest::post("/api/payment-upload")
        .json(&json!({ "serviceProviderId": 424_242, "amount": 1000, "screenshot": "a.png" }))
        .send(app.clone())
        .await;
    assert_eq!(unknown.status(), 404);

    let uploaded = AxumTestRequest::post("/api/payment-upload")
        .json(&json!({ "serviceProviderId": provider.id, "amount": 1000, "screenshot": "uploads/pay.jpg" }))
        .send(app)
        .await;
    assert_eq!(uploaded.status(), 200);
    let uploaded: Value = uploaded.json();
    assert_eq!(uploaded["subscriptionRenewed"], true);
    assert_eq!(uploaded["details"]["serviceProviderId"], provider.id);
    assert_eq!(uploaded["payment"]["proofReference"], "uploads/pay.jpg");
    assert!(uploaded["details"]["subscriptionEndDate"].is_string());
}

#[tokio::test]
async fn test_consumer_create_and_health() {
    let (_ctx, app) = setup().await;

    let created = AxumTestRequest::post("/api/consumer-create")
        .json(&json!({ "name": "Sara Khan", "city": "Lahore", "pin": "4321" }))
        .send(app.clone())
        .await;
    assert_eq!(created.status(), 201);
    let created: Value = created.json();
    assert_eq!(created["message"], "Consumer created successfully");
    assert_eq!(created["data"]["name"], "Sara Khan");

    let bad_pin = AxumTestRequest::post("/api/consumer-create")
        .json(&json!({ "name": "Omar", "city": "Lahore", "pin": "12a4" }))
        .send(app.clone())
        .await;
    assert_eq!(bad_pin.status(), 400);

    let health = AxumTestRequest::get("/health").send(app).await;
    assert_eq!(health.status(), 200);
    let health: Value = health.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], true);
    assert_eq!(health["onlineConnections"], 0);
}
