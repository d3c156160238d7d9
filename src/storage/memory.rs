//! In-memory directory (no persistence)
//!
//! Used when storage is configured as `none`, and by tests that want a real
//! directory without a database file. All data is lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{DeviceDirectory, DeviceStore};
use super::error::{StorageError, StorageResult};
use super::schema::{Device, DeviceId, MonitoredDevice, NewDevice, NewWorkload, Workload};

#[derive(Debug, Default)]
struct Inner {
    /// Devices in insertion (= id) order
    devices: Vec<Device>,
    next_device_id: DeviceId,
    next_workload_id: i64,
}

/// In-memory device directory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: RwLock<Inner>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceDirectory for MemoryDirectory {
    async fn list_monitorable(&self) -> StorageResult<Vec<MonitoredDevice>> {
        let inner = self.inner.read().await;
        Ok(inner.devices.iter().map(MonitoredDevice::from).collect())
    }

    async fn record_status(
        &self,
        id: DeviceId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let device = inner
            .devices
            .iter_mut()
            .find(|device| device.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("device {id}")))?;

        device.is_online = is_online;
        device.last_status_change = Some(at);
        if is_online {
            device.last_seen = Some(at);
        }

        debug!("recorded device {id} as {}", if is_online { "online" } else { "offline" });
        Ok(())
    }
}

#[async_trait]
impl DeviceStore for MemoryDirectory {
    async fn create_device(&self, new: NewDevice) -> StorageResult<Device> {
        let mut inner = self.inner.write().await;

        if inner
            .devices
            .iter()
            .any(|device| device.mac_address == new.mac_address)
        {
            return Err(StorageError::Conflict(format!(
                "mac address {} already registered",
                new.mac_address
            )));
        }

        inner.next_device_id += 1;
        let now = Utc::now();
        let device = Device {
            id: inner.next_device_id,
            mac_address: new.mac_address,
            hostname: new.hostname,
            ip_address: new.ip_address,
            name: new.name,
            notes: new.notes,
            is_disabled: new.is_disabled,
            disabled_at: new.is_disabled.then_some(now),
            is_online: false,
            last_seen: None,
            first_seen: now,
            last_status_change: None,
            workloads: vec![],
        };

        inner.devices.push(device.clone());
        Ok(device)
    }

    async fn get_device(&self, id: DeviceId) -> StorageResult<Option<Device>> {
        let inner = self.inner.read().await;
        Ok(inner.devices.iter().find(|device| device.id == id).cloned())
    }

    async fn get_device_by_mac(&self, mac_address: &str) -> StorageResult<Option<Device>> {
        let inner = self.inner.read().await;
        Ok(inner
            .devices
            .iter()
            .find(|device| device.mac_address == mac_address)
            .cloned())
    }

    async fn list_devices(&self, skip: usize, limit: usize) -> StorageResult<Vec<Device>> {
        let inner = self.inner.read().await;
        Ok(inner.devices.iter().skip(skip).take(limit).cloned().collect())
    }

    async fn create_workload(
        &self,
        device_id: DeviceId,
        new: NewWorkload,
    ) -> StorageResult<Workload> {
        let mut inner = self.inner.write().await;
        let index = inner
            .devices
            .iter()
            .position(|device| device.id == device_id)
            .ok_or_else(|| StorageError::NotFound(format!("device {device_id}")))?;

        inner.next_workload_id += 1;
        let workload = Workload {
            id: inner.next_workload_id,
            name: new.name,
            workload_type: new.workload_type,
            status: "unknown".to_string(),
            port: new.port,
            definition: new.definition,
            run_as_user: new.run_as_user,
            run_as_group: new.run_as_group,
            image: new.image,
            container_id: new.container_id,
            device_id,
        };

        inner.devices[index].workloads.push(workload.clone());
        Ok(workload)
    }
}
