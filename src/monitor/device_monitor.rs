//! DeviceMonitor - periodic liveness checks over the device directory
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → list devices → probe each → compare → record_status → broadcast
//!     ↑                                                                  │
//!     └──────────────── interval after the cycle ends ───────────────────┘
//! ```
//!
//! Cycles never overlap: the next tick is scheduled one interval after the
//! previous cycle finished. Devices are handled in directory order and
//! transitions are broadcast in that order, also when several probes are
//! in flight at once.
//!
//! ## Cancellation
//!
//! The loop ends only through its [`CancellationToken`]. The token is
//! checked while waiting for the next tick and before every device; a device
//! whose probe already started is finished (including its write) first.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::{FutureExt, StreamExt, stream};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::config::MonitorConfig;
use crate::storage::{DeviceDirectory, MonitoredDevice};

use super::messages::{CycleReport, StatusTransitionEvent};
use super::probe::Prober;
use super::registry::SubscriberRegistry;

/// The periodic monitoring loop
pub struct DeviceMonitor {
    directory: Arc<dyn DeviceDirectory>,
    prober: Arc<dyn Prober>,
    registry: Arc<SubscriberRegistry>,
    config: MonitorConfig,
    cancel: CancellationToken,
}

impl DeviceMonitor {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        prober: Arc<dyn Prober>,
        registry: Arc<SubscriberRegistry>,
        config: MonitorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            directory,
            prober,
            registry,
            config,
            cancel,
        }
    }

    /// Run cycles until the cancellation token fires
    #[instrument(skip_all)]
    pub async fn run(self) {
        info!(
            "monitoring task started (interval {}s, probe timeout {}ms)",
            self.config.interval_secs, self.config.probe_timeout_ms
        );

        let mut ticker = interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                _ = ticker.tick() => {}
            }

            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(Ok(report)) => {
                    debug!(
                        "cycle done: {} probed, {} skipped, {} transitions, {} failed writes",
                        report.probed,
                        report.skipped,
                        report.transitions.len(),
                        report.failed_writes
                    );
                }
                Ok(Err(e)) => error!("an error occurred in monitoring cycle: {e:#}"),
                Err(_) => error!("monitoring cycle panicked, retrying after the interval"),
            }

            ticker.reset();
        }

        info!("monitoring task cancelled");
    }

    /// Run one pass over the directory
    ///
    /// Probe failures count as unreachable and a failed status write only
    /// affects its own device. Only a failure to list the directory fails the
    /// whole cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let devices = self
            .directory
            .list_monitorable()
            .await
            .context("failed to list devices")?;

        let total = devices.len();
        let targets: Vec<(MonitoredDevice, String)> = devices
            .into_iter()
            .filter_map(|device| {
                let address = device.probe_target().map(String::from);
                if address.is_none() {
                    trace!("skipping {} (disabled or no address)", device.label);
                }
                address.map(|address| (device, address))
            })
            .collect();

        let mut report = CycleReport {
            skipped: total - targets.len(),
            ..Default::default()
        };

        let prober = self.prober.as_ref();
        let mut probes = stream::iter(targets)
            .map(move |(device, address)| async move {
                let is_online_now = prober.probe(&address).await;
                (device, is_online_now)
            })
            .buffered(self.config.max_concurrent_probes.max(1));

        loop {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some((device, is_online_now)) = probes.next().await else {
                break;
            };
            report.probed += 1;

            if device.is_online == is_online_now {
                continue;
            }

            let event = StatusTransitionEvent {
                device_id: device.id,
                is_online: is_online_now,
                detected_at: Utc::now(),
            };

            info!(
                "status changed for {}: {}",
                device.label,
                if is_online_now { "ONLINE" } else { "OFFLINE" }
            );

            if let Err(e) = self
                .directory
                .record_status(event.device_id, event.is_online, event.detected_at)
                .await
            {
                error!("failed to record status of {}: {e}", device.label);
                report.failed_writes += 1;
                continue;
            }

            self.publish(&event).await;
            report.transitions.push(event);
        }

        Ok(report)
    }

    async fn publish(&self, event: &StatusTransitionEvent) {
        let json = match event.to_message().to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("failed to serialize status update: {e}");
                return;
            }
        };

        let delivery = self.registry.broadcast(&json).await;
        trace!(
            "status update for device {} sent to {} subscribers",
            event.device_id, delivery.delivered
        );
    }
}
