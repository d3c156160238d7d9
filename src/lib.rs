//! NetWatch: liveness monitoring for tracked network devices
//!
//! A background loop probes every monitorable device on a fixed interval,
//! persists online/offline transitions and fans them out to live subscribers.
//! The loop only runs while at least one subscriber is connected.

pub mod api;
pub mod config;
pub mod monitor;
pub mod storage;
