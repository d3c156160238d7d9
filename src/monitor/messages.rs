//! Message types produced by the monitor
//!
//! A [`StatusTransitionEvent`] is built for every detected change, turned into
//! its [`LiveMessage`] wire form, serialized once and fanned out as text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::DeviceId;

/// A device changed between online and offline
///
/// Ephemeral: built, persisted through the directory, broadcast, dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransitionEvent {
    pub device_id: DeviceId,

    /// New reachability
    pub is_online: bool,

    /// When the change was detected
    pub detected_at: DateTime<Utc>,
}

impl StatusTransitionEvent {
    pub fn to_message(&self) -> LiveMessage {
        LiveMessage::StatusUpdate {
            device_id: self.device_id,
            is_online: self.is_online,
        }
    }
}

/// Payloads pushed to live-update subscribers
///
/// Serialized as a flat object tagged by `type`, e.g.
/// `{"type":"status_update","device_id":1,"is_online":true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    StatusUpdate { device_id: DeviceId, is_online: bool },
}

impl LiveMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Outcome of a single monitoring cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Devices handed to the prober
    pub probed: usize,

    /// Devices disabled or without an address
    pub skipped: usize,

    /// Transitions persisted and broadcast, in directory order
    pub transitions: Vec<StatusTransitionEvent>,

    /// Transitions whose directory write failed (not broadcast)
    pub failed_writes: usize,

    /// The cycle stopped early on cancellation
    pub cancelled: bool,
}
