// ABOUTME: HTTP tests for conversation and message routes
// ABOUTME: Exercises the JSON envelopes, status codes and error bodies end to end through the router
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
async fn test_create_conversation_returns_201_then_200() {
    let ctx = common::create_test_resources().await.unwrap();
    let provider = common::create_provider(&ctx.resources, "Ali Plumber", "Lahore", "03001234567")
        .await
        .unwrap();
    let consumer = common::create_consumer(&ctx.resources, "Sara Khan", None)
        .await
        .unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    let body = json!({ "serviceProviderId": provider.id, "consumerId": consumer.id });

    let first = AxumTestRequest::post("/api/conversation")
        .json(&body)
        .send(app.clone())
        .await;
    assert_eq!(first.status(), 201);
    let first: Value = first.json();
    assert_eq!(first["success"], true);
    assert_eq!(first["created"], true);
    assert_eq!(first["conversation"]["status"], "ACTIVE");
    assert_eq!(first["conversation"]["serviceProvider"]["name"], "Ali Plumber");

    let second = AxumTestRequest::post("/api/conversation")
        .json(&body)
        .send(app)
        .await;
    assert_eq!(second.status(), 200);
    let second: Value = second.json();
    assert_eq!(second["created"], false);
    assert_eq!(second["conversation"]["id"], first["conversation"]["id"]);
}

#[tokio::test]
async fn test_create_alias_returns_existing_conversation() {
    let ctx = common::create_test_resources().await.unwrap();
    let seeded = common::seed_conversation(&ctx.resources).await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let response = AxumTestRequest::post("/api/conversation/create")
        .json(&json!({
            "serviceProviderId": seeded.provider.id,
            "consumerId": seeded.consumer.id,
        }))
        .send(app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["created"], false);
    assert_eq!(body["conversation"]["id"], seeded.conversation.id);
}

#[tokio::test]
async fn test_missing_fields_produce_error_envelope() {
    let ctx = common::create_test_resources().await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let response = AxumTestRequest::post("/api/conversation")
        .json(&json!({ "consumerId": 1 }))
        .send(app.clone())
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "MISSING_REQUIRED_FIELD");
    assert_eq!(body["error"]["message"], "serviceProviderId is required");

    let malformed = AxumTestRequest::post("/api/conversation")
        .raw_json("{not json")
        .send(app)
        .await;
    assert_eq!(malformed.status(), 400);
    let body: Value = malformed.json();
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_hello_message_scenario() {
    let ctx = common::create_test_resources().await.unwrap();
    let seeded = common::seed_conversation(&ctx.resources).await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    let id = seeded.conversation.id;

    let sent = AxumTestRequest::post("/api/message")
        .json(&json!({ "id": id, "content": "Hello" }))
        .send(app.clone())
        .await;
    assert_eq!(sent.status(), 201);
    let sent: Value = sent.json();
    assert_eq!(sent["message"]["messageType"], "GENERAL");
    assert_eq!(sent["message"]["senderType"], "consumer");
    assert_eq!(sent["message"]["senderId"], seeded.consumer.id);

    let listed = AxumTestRequest::get(&format!("/api/messages?id={id}"))
        .send(app.clone())
        .await;
    assert_eq!(listed.status(), 200);
    let listed: Value = listed.json();
    let messages = listed["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "Hello");

    let details = AxumTestRequest::get(&format!("/api/conversation?id={id}"))
        .send(app)
        .await;
    let details: Value = details.json();
    assert!(details["conversation"]["lastMessageAt"].is_string());
}

#[tokio::test]
async fn test_status_update_and_terminal_conflict() {
    let ctx = common::create_test_resources().await.unwrap();
    let seeded = common::seed_conversation(&ctx.resources).await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    let uri = format!("/api/conversation/{}/status", seeded.conversation.id);

    let cancelled = AxumTestRequest::put(&uri)
        .json(&json!({ "status": "CANCELLED" }))
        .send(app.clone())
        .await;
    assert_eq!(cancelled.status(), 200);
    let cancelled: Value = cancelled.json();
    assert_eq!(cancelled["conversation"]["status"], "CANCELLED");

    let reopen = AxumTestRequest::put(&uri)
        .json(&json!({ "status": "ACTIVE" }))
        .send(app.clone())
        .await;
    assert_eq!(reopen.status(), 409);
    let reopen: Value = reopen.json();
    assert_eq!(reopen["error"]["code"], "INVALID_STATE_TRANSITION");

    let bogus = AxumTestRequest::put(&uri)
        .json(&json!({ "status": "ARCHIVED" }))
        .send(app)
        .await;
    assert_eq!(bogus.status(), 400);
}

#[tokio::test]
async fn test_negotiation_endpoints_and_user_listing() {
    let ctx = common::create_test_resources().await.unwrap();
    let seeded = common::seed_conversation(&ctx.resources).await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    let id = seeded.conversation.id;

    let offer = AxumTestRequest::post("/api/message/offer")
        .json(&json!({
            "conversationId": id,
            "senderId": seeded.provider.id,
            "senderType": "service_provider",
            "amount": 3000,
            "description": "Paint two rooms",
        }))
        .send(app.clone())
        .await;
    assert_eq!(offer.status(), 201);
    let offer: Value = offer.json();
    assert_eq!(offer["message"]["messageType"], "OFFER");
    assert_eq!(offer["message"]["metadata"]["validityHours"], 24);
    let offer_id = offer["message"]["id"].as_i64().unwrap();

    let accepted = AxumTestRequest::post("/api/message/accept-offer")
        .json(&json!({
            "conversationId": id,
            "senderId": seeded.consumer.id,
            "senderType": "consumer",
            "offerMessageId": offer_id,
        }))
        .send(app.clone())
        .await;
    assert_eq!(accepted.status(), 201);
    let accepted: Value = accepted.json();
    assert_eq!(accepted["message"]["metadata"]["acceptedOfferId"], offer_id);

    let typed = AxumTestRequest::post("/api/message/send")
        .json(&json!({
            "conversationId": id,
            "senderId": seeded.consumer.id,
            "senderType": "consumer",
            "messageType": "OFFER",
            "content": "sneaky",
        }))
        .send(app.clone())
        .await;
    assert_eq!(typed.status(), 400);

    let listing = AxumTestRequest::get(&format!(
        "/api/conversations/consumer/{}",
        seeded.consumer.id
    ))
    .send(app.clone())
    .await;
    assert_eq!(listing.status(), 200);
    let listing: Value = listing.json();
    let conversations = listing["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["unreadCount"], 1);
    assert_eq!(conversations[0]["lastMessage"]["messageType"], "ACCEPT");

    let read = AxumTestRequest::put(&format!("/api/conversation/{id}/read"))
        .json(&json!({ "userId": seeded.consumer.id, "userType": "consumer" }))
        .send(app.clone())
        .await;
    let read: Value = read.json();
    assert_eq!(read["count"], 1);
    assert_eq!(read["message"], "Marked 1 messages as read");

    let window = AxumTestRequest::get(&format!("/api/conversation/{id}/messages?limit=1"))
        .send(app)
        .await;
    let window: Value = window.json();
    let messages = window["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["messageType"], "ACCEPT");
}

#[tokio::test]
async fn test_online_users_endpoint_starts_empty() {
    let ctx = common::create_test_resources().await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();

    let response = AxumTestRequest::get("/api/online-users").send(app).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json();
    assert_eq!(body["count"], 0);
    assert_eq!(body["onlineUsers"], json!([]));
}
