//! Directory trait definitions
//!
//! The monitor only needs two operations from the directory, captured by
//! [`DeviceDirectory`]. Registration endpoints need the full read/write
//! surface, captured by [`DeviceStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{Device, DeviceId, MonitoredDevice, NewDevice, NewWorkload, Workload};

/// Default page size for [`DeviceStore::list_devices`]
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Read/write surface consumed by the monitor loop
///
/// Implementations must be `Send + Sync` as they are shared between the
/// monitor task and request handlers.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Every device, in primary-key order
    ///
    /// Devices that must not be probed are included; filtering is the
    /// monitor's job (see [`MonitoredDevice::probe_target`]).
    async fn list_monitorable(&self) -> StorageResult<Vec<MonitoredDevice>>;

    /// Persist a new online state for a device
    ///
    /// Sets `is_online` and `last_status_change`, and `last_seen` when the
    /// device came online. Writing the same arguments twice leaves the
    /// directory as a single write would.
    async fn record_status(&self, id: DeviceId, is_online: bool, at: DateTime<Utc>)
    -> StorageResult<()>;
}

/// Full directory used by the registration API
#[async_trait]
pub trait DeviceStore: DeviceDirectory {
    /// Register a new device
    ///
    /// Fails with `StorageError::Conflict` if the MAC address is taken.
    async fn create_device(&self, device: NewDevice) -> StorageResult<Device>;

    /// Fetch a device with its workloads
    async fn get_device(&self, id: DeviceId) -> StorageResult<Option<Device>>;

    /// Fetch a device by MAC address
    async fn get_device_by_mac(&self, mac_address: &str) -> StorageResult<Option<Device>>;

    /// A page of devices with their workloads, in id order
    async fn list_devices(&self, skip: usize, limit: usize) -> StorageResult<Vec<Device>>;

    /// Register a workload on an existing device
    ///
    /// Fails with `StorageError::NotFound` if the device does not exist.
    async fn create_workload(
        &self,
        device_id: DeviceId,
        workload: NewWorkload,
    ) -> StorageResult<Workload>;
}
