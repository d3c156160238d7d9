//! Liveness monitoring and live-update fan-out
//!
//! ## Architecture Overview
//!
//! ```text
//!              WebSocket handler
//!       ┌──────────────┴──────────────┐
//!       │ add / remove                │ ensure_loop_running / stop_loop_if_idle
//! ┌─────▼──────────────┐   ┌──────────▼──────────┐
//! │ SubscriberRegistry │   │ LifecycleController │
//! └─────▲──────────────┘   └──────────┬──────────┘
//!       │ broadcast                   │ start / cancel
//!       │                     ┌───────▼───────┐
//!       └─────────────────────┤ DeviceMonitor │
//!                             └──┬─────────┬──┘
//!                          probe │         │ list / record
//!                        ┌───────▼┐ ┌──────▼──────────┐
//!                        │ Prober │ │ DeviceDirectory │
//!                        └────────┘ └─────────────────┘
//! ```
//!
//! - **DeviceMonitor**: one cycle per interval, probes every monitorable device
//!   and reports online/offline transitions
//! - **Prober**: single bounded-timeout reachability check, never fails
//! - **SubscriberRegistry**: connected clients, text fan-out
//! - **LifecycleController**: runs the monitor only while subscribers exist

pub mod device_monitor;
pub mod lifecycle;
pub mod messages;
pub mod probe;
pub mod registry;

pub use device_monitor::DeviceMonitor;
pub use lifecycle::{LifecycleController, MonitorState};
pub use messages::{CycleReport, LiveMessage, StatusTransitionEvent};
pub use probe::{IcmpProber, Prober};
pub use registry::{BroadcastReport, RegistryError, Subscriber, SubscriberId, SubscriberRegistry};
