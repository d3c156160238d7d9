//! Integration tests for the monitor loop lifecycle
//!
//! These tests verify that:
//! - The first subscriber starts the loop and transitions reach it
//! - Transitions are persisted before they are broadcast
//! - The last subscriber leaving stops the loop
//! - A stopped loop can be restarted

use std::sync::Arc;
use std::time::Duration;

use netwatch::monitor::{
    LifecycleController, LiveMessage, MonitorState, Subscriber, SubscriberRegistry,
};
use netwatch::storage::{DeviceStore, MemoryDirectory};
use pretty_assertions::assert_eq;

use crate::helpers::{SwitchableProber, fast_monitor_config, new_device};

fn status(device_id: i64, is_online: bool) -> LiveMessage {
    LiveMessage::StatusUpdate {
        device_id,
        is_online,
    }
}

async fn next_message(rx: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> LiveMessage {
    let text = tokio::time::timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("no update within timeout")
        .expect("channel closed");
    serde_json::from_str(&text).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_receives_transitions_in_order() {
    let directory = Arc::new(MemoryDirectory::new());
    let first = directory
        .create_device(new_device("00:00:00:00:00:01", Some("10.0.0.1")))
        .await
        .unwrap();
    let second = directory
        .create_device(new_device("00:00:00:00:00:02", Some("10.0.0.2")))
        .await
        .unwrap();

    let prober = Arc::new(SwitchableProber::new(&[
        ("10.0.0.1", true),
        ("10.0.0.2", true),
    ]));
    let registry = Arc::new(SubscriberRegistry::new());
    let lifecycle = LifecycleController::new(
        directory.clone(),
        prober.clone(),
        registry.clone(),
        fast_monitor_config(),
    );

    let (subscriber, mut rx) = Subscriber::channel();
    registry.add(subscriber).await;
    assert!(lifecycle.ensure_loop_running().await);

    assert_eq!(next_message(&mut rx).await, status(first.id, true));
    assert_eq!(next_message(&mut rx).await, status(second.id, true));

    let stored = directory.get_device(first.id).await.unwrap().unwrap();
    assert!(stored.is_online);
    assert!(stored.last_seen.is_some());

    prober.set("10.0.0.1", false);
    assert_eq!(next_message(&mut rx).await, status(first.id, false));

    let stored = directory.get_device(first.id).await.unwrap().unwrap();
    assert!(!stored.is_online);

    lifecycle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_loop_follows_subscriber_presence() {
    let directory = Arc::new(MemoryDirectory::new());
    let registry = Arc::new(SubscriberRegistry::new());
    let lifecycle = LifecycleController::new(
        directory,
        Arc::new(SwitchableProber::default()),
        registry.clone(),
        fast_monitor_config(),
    );

    assert_eq!(lifecycle.state(), MonitorState::Idle);

    let (first, _rx1) = Subscriber::channel();
    let (second, _rx2) = Subscriber::channel();
    let first = registry.add(first).await;
    assert!(lifecycle.ensure_loop_running().await);
    let second = registry.add(second).await;
    assert!(!lifecycle.ensure_loop_running().await);

    registry.remove(first).await.unwrap();
    assert!(!lifecycle.stop_loop_if_idle().await);
    assert_eq!(lifecycle.state(), MonitorState::Running);

    registry.remove(second).await.unwrap();
    assert!(lifecycle.stop_loop_if_idle().await);
    assert_eq!(lifecycle.state(), MonitorState::Idle);

    let (again, _rx3) = Subscriber::channel();
    registry.add(again).await;
    assert!(lifecycle.ensure_loop_running().await);
    assert_eq!(lifecycle.state(), MonitorState::Running);

    assert!(lifecycle.shutdown().await);
}

#[tokio::test(start_paused = true)]
async fn test_device_registered_while_running_is_picked_up() {
    let directory = Arc::new(MemoryDirectory::new());
    let prober = Arc::new(SwitchableProber::new(&[("10.0.0.9", true)]));
    let registry = Arc::new(SubscriberRegistry::new());
    let lifecycle = LifecycleController::new(
        directory.clone(),
        prober,
        registry.clone(),
        fast_monitor_config(),
    );

    let (subscriber, mut rx) = Subscriber::channel();
    registry.add(subscriber).await;
    lifecycle.ensure_loop_running().await;

    // Let a few empty cycles pass
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(rx.try_recv().is_err());

    let device = directory
        .create_device(new_device("00:00:00:00:00:09", Some("10.0.0.9")))
        .await
        .unwrap();

    assert_eq!(next_message(&mut rx).await, status(device.id, true));

    lifecycle.shutdown().await;
}
