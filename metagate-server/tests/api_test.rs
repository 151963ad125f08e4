mod common;

use axum::body::Body;
use axum::http::{Request, header};
use serde_json::json;

use metagate_server::models::Command;

use common::mock_app::MockApp;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = MockApp::new();
    let (status, body) = app.json(get("/api/v1/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    assert!(body["time"].is_string());
}

#[tokio::test]
async fn test_list_devices() {
    let app = MockApp::new();
    app.seed_device("gate-001").await;
    app.seed_device("7001").await;

    let (status, body) = app.json(get("/api/v1/devices")).await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["uid"], "7001");
    assert_eq!(data[1]["uid"], "gate-001");
}

#[tokio::test]
async fn test_patch_device_toggles_enabled() {
    let app = MockApp::new();
    app.seed_device("gate-001").await;

    let (status, body) = app
        .json(json_request(
            "PATCH",
            "/api/v1/device/gate-001",
            json!({ "enabled": false }),
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["enabled"], false);
    assert!(!app.registry.get("gate-001").await.unwrap().enabled);
}

#[tokio::test]
async fn test_patch_unknown_device_is_404() {
    let app = MockApp::new();
    let (status, body) = app
        .json(json_request(
            "PATCH",
            "/api/v1/device/missing",
            json!({ "enabled": true }),
        ))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_ping_returns_queued_commands() {
    let app = MockApp::new();
    app.seed_device("gate-001").await;
    app.hub
        .enqueue(
            "gate-001",
            Command {
                id: String::from("c1"),
                kind: String::from("reboot"),
                payload: None,
            },
        )
        .await;

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/v1/device/gate-001/ping",
            json!({}),
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["pong"], true);
    let commands = body["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["type"], "reboot");

    // Polling marks the device online.
    assert!(app.registry.get("gate-001").await.unwrap().online);
}

#[tokio::test]
async fn test_enqueue_command_roundtrip() {
    let app = MockApp::new();
    app.seed_device("gate-002").await;

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/v1/device/gate-002/commands",
            json!({ "type": "setparam", "payload": { "level": 200 } }),
        ))
        .await;
    assert_eq!(status, 200);
    assert!(body["data"]["id"].is_string());

    let commands = app
        .hub
        .long_poll("gate-002", std::time::Duration::from_millis(20))
        .await;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].kind, "setparam");
}

#[tokio::test]
async fn test_enqueue_command_validation() {
    let app = MockApp::new();
    app.seed_device("gate-002").await;

    let (status, _) = app
        .json(json_request(
            "POST",
            "/api/v1/device/gate-002/commands",
            json!({ "type": "" }),
        ))
        .await;
    assert_eq!(status, 400);

    let (status, _) = app
        .json(json_request(
            "POST",
            "/api/v1/device/missing/commands",
            json!({ "type": "reboot" }),
        ))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_status_report_is_republished() {
    let app = MockApp::new();
    app.seed_device("gate-003").await;

    let (status, _) = app
        .json(json_request(
            "POST",
            "/api/v1/device/gate-003/status",
            json!({ "state": 1, "in": 5, "out": 3 }),
        ))
        .await;
    assert_eq!(status, 200);

    let events = app.bus.pull(0, 10).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.topic, "device/status");
    assert_eq!(events[0].1.device_id, "gate-003");
    assert!(app.registry.get("gate-003").await.unwrap().online);
}
