//! Integration tests for the HTTP ingress router, without WebSocket
//! clients: connections are registered directly with a channel standing in
//! for the connection task.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use wsgate::prelude::*;
use wsgate::router;

fn setup() -> (TestServer, Arc<SessionRegistry>) {
    let registry = Arc::new(SessionRegistry::new());
    let ingress = Arc::new(PushIngress::new(Arc::clone(&registry)));
    let server = TestServer::new(router(ingress)).unwrap();
    (server, registry)
}

fn app(name: &str) -> AppName {
    AppName::new(name).unwrap()
}

#[tokio::test]
async fn test_push_non_json_body_is_bad_request() {
    let (server, _) = setup();

    let resp = server.post("/push").text("hello").await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().is_some());
}

#[tokio::test]
async fn test_push_missing_routing_fields_is_bad_request() {
    let (server, _) = setup();

    for body in [
        json!({"member_id": 1}),
        json!({"app": "", "member_id": 1}),
        json!({"app": "im"}),
        json!(["im", 1]),
    ] {
        let resp = server.post("/push").json(&body).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_push_without_recipient_is_accepted() {
    let (server, registry) = setup();

    let resp = server
        .post("/push")
        .json(&json!({"app": "match", "member_id": 555}))
        .await;

    resp.assert_status(StatusCode::ACCEPTED);
    assert_eq!(resp.json::<Value>(), json!({"outcome": "no_recipient"}));
    assert_eq!(registry.stats(), RegistryStats::default());
}

#[tokio::test]
async fn test_push_forwards_body_unchanged() {
    let (server, registry) = setup();
    let (tx, mut rx) = mpsc::channel(8);
    registry.register(ConnectionId::new(1), MemberId(8), tx).unwrap();
    registry.subscribe(ConnectionId::new(1), app("im")).unwrap();

    let raw = r#"{"app":"im","member_id":8,"text":"{\"hello\":8}"}"#;
    let resp = server.post("/push").text(raw).await;

    resp.assert_status(StatusCode::ACCEPTED);
    let frame = rx.try_recv().expect("frame should be queued");
    assert_eq!(&*frame, raw.as_bytes());
    assert_eq!(unwrap_text(&frame).unwrap(), json!({"hello": 8}));
}

#[tokio::test]
async fn test_push_counts_closed_recipient_as_failed() {
    let (server, registry) = setup();
    let (live_tx, mut live_rx) = mpsc::channel(8);
    let (dead_tx, dead_rx) = mpsc::channel(8);
    registry.register(ConnectionId::new(1), MemberId(8), live_tx).unwrap();
    registry.register(ConnectionId::new(2), MemberId(8), dead_tx).unwrap();
    registry.subscribe(ConnectionId::new(1), app("im")).unwrap();
    registry.subscribe(ConnectionId::new(2), app("im")).unwrap();
    drop(dead_rx);

    let resp = server
        .post("/push")
        .json(&json!({"app": "im", "member_id": 8}))
        .await;

    assert_eq!(
        resp.json::<Value>(),
        json!({"outcome": "delivered", "delivered": 1, "failed": 1})
    );
    assert!(live_rx.try_recv().is_ok());
    assert!(!registry.contains(ConnectionId::new(2)));
}

#[tokio::test]
async fn test_push_counts_full_outbox_as_failed() {
    let (server, registry) = setup();
    // Capacity 1 and nobody reading: the second push finds it full.
    let (tx, _rx) = mpsc::channel(1);
    registry.register(ConnectionId::new(1), MemberId(8), tx).unwrap();
    registry.subscribe(ConnectionId::new(1), app("im")).unwrap();

    let body = json!({"app": "im", "member_id": 8});
    let first = server.post("/push").json(&body).await;
    let second = server.post("/push").json(&body).await;

    assert_eq!(
        first.json::<Value>(),
        json!({"outcome": "delivered", "delivered": 1, "failed": 0})
    );
    assert_eq!(
        second.json::<Value>(),
        json!({"outcome": "delivered", "delivered": 0, "failed": 1})
    );
    assert!(registry.contains(ConnectionId::new(1)));
}

#[tokio::test]
async fn test_stats_empty_registry() {
    let (server, _) = setup();

    let resp = server.get("/stats").await;

    resp.assert_status_ok();
    assert_eq!(
        resp.json::<Value>(),
        json!({"connections": 0, "members": 0, "apps": {}})
    );
}
