//! Starting and stopping the monitor with the subscriber population
//!
//! The monitor only needs to run while somebody is listening. The connect
//! path calls [`LifecycleController::ensure_loop_running`] after registering
//! a subscriber; the disconnect path calls
//! [`LifecycleController::stop_loop_if_idle`] after removing one. At most one
//! loop instance exists at a time: the handle slot is guarded by a mutex and
//! a stopped loop is awaited before the slot is released.
//!
//! [`LifecycleController::state`] reads a flag owned by the loop task instead
//! of the slot, so it never waits behind a loop that is shutting down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::MonitorConfig;
use crate::storage::DeviceDirectory;

use super::device_monitor::DeviceMonitor;
use super::probe::Prober;
use super::registry::SubscriberRegistry;

/// Whether the monitor loop is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    Idle,
    Running,
}

/// A running monitor loop
pub struct MonitorLoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorLoopHandle {
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal cancellation and wait for the loop to exit
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("monitor task ended abnormally: {e}");
        }
    }
}

/// Clears the running flag when the loop task ends, panics included
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owner of the (at most one) monitor loop
pub struct LifecycleController {
    directory: Arc<dyn DeviceDirectory>,
    prober: Arc<dyn Prober>,
    registry: Arc<SubscriberRegistry>,
    config: MonitorConfig,
    handle: Mutex<Option<MonitorLoopHandle>>,
    running: Arc<AtomicBool>,
}

impl LifecycleController {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        prober: Arc<dyn Prober>,
        registry: Arc<SubscriberRegistry>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            directory,
            prober,
            registry,
            config,
            handle: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Start the loop unless it is already running
    ///
    /// Returns `true` if a new loop was started.
    pub async fn ensure_loop_running(&self) -> bool {
        let mut slot = self.handle.lock().await;

        if slot.as_ref().is_some_and(MonitorLoopHandle::is_running) {
            return false;
        }

        let cancel = CancellationToken::new();
        let monitor = DeviceMonitor::new(
            self.directory.clone(),
            self.prober.clone(),
            self.registry.clone(),
            self.config.clone(),
            cancel.clone(),
        );

        self.running.store(true, Ordering::SeqCst);
        let flag = RunningFlag(self.running.clone());

        *slot = Some(MonitorLoopHandle {
            cancel,
            task: tokio::spawn(async move {
                let _flag = flag;
                monitor.run().await;
            }),
        });

        info!("monitor loop started");
        true
    }

    /// Stop the loop if no subscriber is left
    ///
    /// Returns `true` if a running loop was stopped.
    pub async fn stop_loop_if_idle(&self) -> bool {
        let mut slot = self.handle.lock().await;

        if !self.registry.is_empty().await {
            debug!("subscribers remain, keeping monitor loop");
            return false;
        }

        Self::stop_slot(&mut slot).await
    }

    /// Stop the loop regardless of subscribers (process shutdown)
    pub async fn shutdown(&self) -> bool {
        let mut slot = self.handle.lock().await;
        Self::stop_slot(&mut slot).await
    }

    pub fn state(&self) -> MonitorState {
        if self.running.load(Ordering::SeqCst) {
            MonitorState::Running
        } else {
            MonitorState::Idle
        }
    }

    async fn stop_slot(slot: &mut Option<MonitorLoopHandle>) -> bool {
        let Some(handle) = slot.take() else {
            return false;
        };

        let was_running = handle.is_running();
        handle.stop().await;
        if was_running {
            info!("monitor loop stopped");
        }
        was_running
    }
}
