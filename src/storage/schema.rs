//! Device and workload records
//!
//! Devices are the unit of liveness monitoring. Workloads hang off a device
//! and are only ever registered and read back; the monitor never touches them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a device (SQLite `INTEGER PRIMARY KEY`)
pub type DeviceId = i64;

/// Kind of workload running on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadType {
    DockerContainer,
    PodmanContainer,
    LxcContainer,
    SystemdUnit,
    VirtualMachine,
    Process,
}

impl WorkloadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadType::DockerContainer => "docker_container",
            WorkloadType::PodmanContainer => "podman_container",
            WorkloadType::LxcContainer => "lxc_container",
            WorkloadType::SystemdUnit => "systemd_unit",
            WorkloadType::VirtualMachine => "virtual_machine",
            WorkloadType::Process => "process",
        }
    }
}

impl fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker_container" => Ok(WorkloadType::DockerContainer),
            "podman_container" => Ok(WorkloadType::PodmanContainer),
            "lxc_container" => Ok(WorkloadType::LxcContainer),
            "systemd_unit" => Ok(WorkloadType::SystemdUnit),
            "virtual_machine" => Ok(WorkloadType::VirtualMachine),
            "process" => Ok(WorkloadType::Process),
            other => Err(format!("unknown workload type: {other}")),
        }
    }
}

/// A registered network device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub mac_address: String,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub name: Option<String>,
    pub notes: Option<String>,

    /// Disabled devices are never probed
    pub is_disabled: bool,
    pub disabled_at: Option<DateTime<Utc>>,

    /// Last state recorded by the monitor
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub first_seen: DateTime<Utc>,
    pub last_status_change: Option<DateTime<Utc>>,

    #[serde(default)]
    pub workloads: Vec<Workload>,
}

/// Registration payload for a new device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDevice {
    pub mac_address: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_disabled: bool,
}

/// A workload (container, unit, VM, process) running on a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub id: i64,
    pub name: String,
    pub workload_type: WorkloadType,

    /// Free-form state such as "running" or "stopped"
    pub status: String,
    pub port: Option<u16>,

    pub definition: Option<String>,
    pub run_as_user: Option<String>,
    pub run_as_group: Option<String>,

    pub image: Option<String>,
    pub container_id: Option<String>,

    pub device_id: DeviceId,
}

/// Registration payload for a new workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkload {
    pub name: String,
    pub workload_type: WorkloadType,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub run_as_user: Option<String>,
    #[serde(default)]
    pub run_as_group: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

/// The slice of a device the monitor loop works with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredDevice {
    pub id: DeviceId,
    pub address: Option<String>,
    pub monitoring_enabled: bool,
    pub is_online: bool,

    /// Hostname, falling back to the address (for logging)
    pub label: String,
}

impl MonitoredDevice {
    /// Address to probe, or `None` if this device must be skipped
    pub fn probe_target(&self) -> Option<&str> {
        if !self.monitoring_enabled {
            return None;
        }

        self.address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }
}

impl From<&Device> for MonitoredDevice {
    fn from(device: &Device) -> Self {
        let label = device
            .hostname
            .clone()
            .or_else(|| device.ip_address.clone())
            .unwrap_or_else(|| format!("device {}", device.id));

        Self {
            id: device.id,
            address: device.ip_address.clone(),
            monitoring_enabled: !device.is_disabled,
            is_online: device.is_online,
            label,
        }
    }
}
