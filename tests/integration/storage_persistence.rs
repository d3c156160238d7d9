//! Integration tests for the SQLite device directory
//!
//! These tests verify that:
//! - Devices and workloads survive a reopen of the database
//! - Status writes update the liveness columns
//! - Duplicate MAC addresses are rejected
//! - Pagination returns devices in insertion order

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use netwatch::storage::sqlite::SqliteDirectory;
use netwatch::storage::{DeviceDirectory, DeviceStore, NewWorkload, StorageError, WorkloadType};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::new_device;

fn workload(name: &str, workload_type: WorkloadType) -> NewWorkload {
    NewWorkload {
        name: name.to_string(),
        workload_type,
        port: None,
        definition: None,
        run_as_user: None,
        run_as_group: None,
        image: None,
        container_id: None,
    }
}

#[tokio::test]
async fn test_devices_persist_across_reopen() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("netwatch.db");

    let id = {
        let directory = SqliteDirectory::new(&db_path).await.unwrap();
        let device = directory
            .create_device(new_device("aa:aa:aa:aa:aa:01", Some("192.168.1.10")))
            .await
            .unwrap();
        directory
            .create_workload(
                device.id,
                NewWorkload {
                    port: Some(8080),
                    image: Some("nginx:latest".to_string()),
                    ..workload("web", WorkloadType::DockerContainer)
                },
            )
            .await
            .unwrap();
        directory.close().await;
        device.id
    };

    let directory = SqliteDirectory::new(&db_path).await.unwrap();
    let device = directory.get_device(id).await.unwrap().unwrap();

    assert_eq!(device.mac_address, "aa:aa:aa:aa:aa:01");
    assert_eq!(device.ip_address.as_deref(), Some("192.168.1.10"));
    assert!(!device.is_online);
    assert_eq!(device.workloads.len(), 1);
    assert_eq!(device.workloads[0].port, Some(8080));
    assert_eq!(device.workloads[0].status, "unknown");
    assert_eq!(device.workloads[0].workload_type, WorkloadType::DockerContainer);
}

#[tokio::test]
async fn test_record_status_updates_liveness_columns() {
    let temp_dir = tempdir().unwrap();
    let directory = SqliteDirectory::new(temp_dir.path().join("netwatch.db"))
        .await
        .unwrap();

    let device = directory
        .create_device(new_device("aa:aa:aa:aa:aa:01", Some("192.168.1.10")))
        .await
        .unwrap();

    let online_at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
    directory.record_status(device.id, true, online_at).await.unwrap();

    let stored = directory.get_device(device.id).await.unwrap().unwrap();
    assert!(stored.is_online);
    assert_eq!(stored.last_seen, Some(online_at));
    assert_eq!(stored.last_status_change, Some(online_at));

    directory.record_status(device.id, true, online_at).await.unwrap();
    let twice = directory.get_device(device.id).await.unwrap().unwrap();
    assert_eq!(twice, stored);

    let offline_at = online_at + Duration::seconds(30);
    directory
        .record_status(device.id, false, offline_at)
        .await
        .unwrap();
    let stored = directory.get_device(device.id).await.unwrap().unwrap();

    directory
        .record_status(device.id, false, offline_at)
        .await
        .unwrap();
    let twice = directory.get_device(device.id).await.unwrap().unwrap();
    assert_eq!(twice, stored);

    assert!(!stored.is_online);
    assert_eq!(stored.last_seen, Some(online_at));
    assert_eq!(stored.last_status_change, Some(offline_at));

    let monitored = directory.list_monitorable().await.unwrap();
    assert_eq!(monitored.len(), 1);
    assert!(!monitored[0].is_online);
    assert_eq!(monitored[0].probe_target(), Some("192.168.1.10"));
}

#[tokio::test]
async fn test_record_status_unknown_device_is_not_found() {
    let temp_dir = tempdir().unwrap();
    let directory = SqliteDirectory::new(temp_dir.path().join("netwatch.db"))
        .await
        .unwrap();

    let result = directory.record_status(404, true, Utc::now()).await;
    assert_matches!(result, Err(StorageError::NotFound(_)));
}

#[tokio::test]
async fn test_duplicate_mac_is_conflict() {
    let temp_dir = tempdir().unwrap();
    let directory = SqliteDirectory::new(temp_dir.path().join("netwatch.db"))
        .await
        .unwrap();

    directory
        .create_device(new_device("aa:aa:aa:aa:aa:01", None))
        .await
        .unwrap();
    let result = directory
        .create_device(new_device("aa:aa:aa:aa:aa:01", Some("10.0.0.1")))
        .await;

    assert_matches!(result, Err(StorageError::Conflict(_)));
}

#[tokio::test]
async fn test_list_devices_paginates_in_order() {
    let temp_dir = tempdir().unwrap();
    let directory = SqliteDirectory::new(temp_dir.path().join("netwatch.db"))
        .await
        .unwrap();

    for i in 1..=5 {
        let device = directory
            .create_device(new_device(&format!("aa:aa:aa:aa:aa:0{i}"), None))
            .await
            .unwrap();
        directory
            .create_workload(device.id, workload(&format!("unit-{i}"), WorkloadType::SystemdUnit))
            .await
            .unwrap();
    }

    let page = directory.list_devices(1, 2).await.unwrap();
    let macs: Vec<_> = page.iter().map(|d| d.mac_address.as_str()).collect();
    assert_eq!(macs, vec!["aa:aa:aa:aa:aa:02", "aa:aa:aa:aa:aa:03"]);
    assert_eq!(page[0].workloads[0].name, "unit-2");
    assert_eq!(page[1].workloads[0].name, "unit-3");

    let found = directory
        .get_device_by_mac("aa:aa:aa:aa:aa:05")
        .await
        .unwrap();
    assert!(found.is_some());
    assert!(directory.get_device_by_mac("ff:ff").await.unwrap().is_none());
}

#[tokio::test]
async fn test_workload_for_missing_device_is_not_found() {
    let temp_dir = tempdir().unwrap();
    let directory = SqliteDirectory::new(temp_dir.path().join("netwatch.db"))
        .await
        .unwrap();

    let result = directory
        .create_workload(7, workload("orphan", WorkloadType::Process))
        .await;
    assert_matches!(result, Err(StorageError::NotFound(_)));
}
