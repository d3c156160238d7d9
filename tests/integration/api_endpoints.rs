//! Integration tests for the HTTP API and the live-update stream
//!
//! These tests start a real server on an ephemeral port and verify that:
//! - Devices and workloads can be registered and read back
//! - A WebSocket client receives `status_update` messages
//! - The monitor runs only while a client is connected

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use netwatch::api::{ApiConfig, ApiState, spawn_api_server};
use netwatch::monitor::{LifecycleController, SubscriberRegistry};
use netwatch::storage::MemoryDirectory;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::helpers::{SwitchableProber, fast_monitor_config};

async fn start_server(prober: Arc<SwitchableProber>) -> SocketAddr {
    let store = Arc::new(MemoryDirectory::new());
    let lifecycle = Arc::new(LifecycleController::new(
        store.clone(),
        prober,
        Arc::new(SubscriberRegistry::new()),
        fast_monitor_config(),
    ));

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: true,
    };

    spawn_api_server(config, ApiState::new(store, lifecycle))
        .await
        .unwrap()
}

async fn health(client: &reqwest::Client, addr: SocketAddr) -> Value {
    client
        .get(format!("http://{addr}/api/v1/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Poll the health endpoint until the monitor reports `expected`
async fn wait_for_monitor(client: &reqwest::Client, addr: SocketAddr, expected: &str) -> Value {
    for _ in 0..100 {
        let body = health(client, addr).await;
        if body["monitor"] == expected {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("monitor never became {expected}");
}

#[tokio::test]
async fn test_register_and_fetch_device() {
    let addr = start_server(Arc::new(SwitchableProber::default())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/devices"))
        .json(&json!({
            "mac_address": "de:ad:be:ef:00:01",
            "ip_address": "10.1.0.1",
            "hostname": "nas",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let device: Value = response.json().await.unwrap();
    let id = device["id"].as_i64().unwrap();

    let response = client
        .post(format!("http://{addr}/api/v1/devices/{id}/workloads"))
        .json(&json!({"name": "postgres", "workload_type": "podman_container", "port": 5432}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let device: Value = client
        .get(format!("http://{addr}/api/v1/devices/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(device["hostname"], "nas");
    assert_eq!(device["workloads"][0]["workload_type"], "podman_container");

    let response = client
        .get(format!("http://{addr}/api/v1/devices/{}", id + 1))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stream_delivers_status_updates() {
    let prober = Arc::new(SwitchableProber::new(&[("10.1.0.1", true)]));
    let addr = start_server(prober.clone()).await;
    let client = reqwest::Client::new();

    let device: Value = client
        .post(format!("http://{addr}/api/v1/devices"))
        .json(&json!({"mac_address": "de:ad:be:ef:00:01", "ip_address": "10.1.0.1"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = device["id"].as_i64().unwrap();

    let (mut ws, _) = connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();

    let update = next_text(&mut ws).await;
    assert_eq!(
        update,
        json!({"type": "status_update", "device_id": id, "is_online": true})
    );

    prober.set("10.1.0.1", false);
    let update = next_text(&mut ws).await;
    assert_eq!(
        update,
        json!({"type": "status_update", "device_id": id, "is_online": false})
    );

    let stored: Value = client
        .get(format!("http://{addr}/api/v1/devices/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["is_online"], false);
    assert!(stored["last_seen"].is_string());

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_monitor_runs_only_while_clients_are_connected() {
    let addr = start_server(Arc::new(SwitchableProber::default())).await;
    let client = reqwest::Client::new();

    let body = health(&client, addr).await;
    assert_eq!(body["monitor"], "idle");
    assert_eq!(body["subscribers"], 0);

    let (mut first, _) = connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();
    let (mut second, _) = connect_async(format!("ws://{addr}/api/v1/stream"))
        .await
        .unwrap();

    let body = wait_for_monitor(&client, addr, "running").await;
    assert!(body["subscribers"].as_u64().unwrap() >= 1);

    first.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let body = health(&client, addr).await;
    assert_eq!(body["monitor"], "running");

    second.close(None).await.unwrap();
    let body = wait_for_monitor(&client, addr, "idle").await;
    assert_eq!(body["subscribers"], 0);
}

async fn next_text<S>(ws: &mut S) -> Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), ws.next())
            .await
            .expect("no message within timeout")
            .expect("stream ended")
            .unwrap();

        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}
