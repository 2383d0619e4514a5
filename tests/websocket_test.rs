// ABOUTME: End-to-end WebSocket tests against a live server on an ephemeral port
// ABOUTME: Authenticates, joins a conversation and receives messages posted over HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hojaega.pk
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use futures_util::{SinkExt, StreamExt};
use helpers::axum_test::AxumTestRequest;
use hojaega_server::server::HojaegaServer;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn send_event(client: &mut Client, event: Value) {
    client
        .send(Message::Text(event.to_string()))
        .await
        .unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(3), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_joined_consumer_receives_posted_message() {
    let ctx = common::create_test_resources().await.unwrap();
    let seeded = common::seed_conversation(&ctx.resources).await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    let addr = spawn_server(app.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    send_event(
        &mut client,
        json!({ "event": "authenticate", "data": { "userId": seeded.consumer.id, "userType": "consumer" } }),
    )
    .await;
    let authenticated = next_event(&mut client).await;
    assert_eq!(authenticated["event"], "authenticated");

    send_event(
        &mut client,
        json!({ "event": "join_conversation", "data": { "conversationId": seeded.conversation.id } }),
    )
    .await;
    let joined = next_event(&mut client).await;
    assert_eq!(joined["event"], "joined_conversation");
    assert_eq!(joined["data"]["conversationId"], seeded.conversation.id);

    let online: Value = AxumTestRequest::get("/api/online-users")
        .send(app.clone())
        .await
        .json();
    assert_eq!(online["count"], 1);

    let posted = AxumTestRequest::post("/api/message/send")
        .json(&json!({
            "conversationId": seeded.conversation.id,
            "senderId": seeded.provider.id,
            "senderType": "service_provider",
            "content": "I can come tomorrow morning",
        }))
        .send(app)
        .await;
    assert_eq!(posted.status(), 201);

    let delivered = next_event(&mut client).await;
    assert_eq!(delivered["event"], "new_message");
    assert_eq!(delivered["data"]["message"]["content"], "I can come tomorrow morning");
    assert_eq!(delivered["data"]["message"]["messageType"], "GENERAL");

    let notice = next_event(&mut client).await;
    assert_eq!(notice["event"], "notification");
    assert_eq!(notice["data"]["senderName"], "Ali Plumber");
}

#[tokio::test]
async fn test_malformed_frames_and_unknown_accounts() {
    let ctx = common::create_test_resources().await.unwrap();
    let app = HojaegaServer::new(ctx.resources.clone()).router();
    let addr = spawn_server(app).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

    send_event(&mut client, json!({ "event": "shout", "data": {} })).await;
    let error = next_event(&mut client).await;
    assert_eq!(error["event"], "error");
    assert!(error["data"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Invalid message format:"));

    send_event(
        &mut client,
        json!({ "event": "authenticate", "data": { "userId": 777, "userType": "service_provider" } }),
    )
    .await;
    let rejected = next_event(&mut client).await;
    assert_eq!(rejected["event"], "auth_error");
    assert_eq!(rejected["data"]["message"], "Service provider not found");

    send_event(
        &mut client,
        json!({ "event": "join_conversation", "data": { "conversationId": 1 } }),
    )
    .await;
    let refused = next_event(&mut client).await;
    assert_eq!(refused["event"], "error");
}
