//! API shared state

use std::sync::Arc;

use crate::monitor::{LifecycleController, SubscriberRegistry};
use crate::storage::DeviceStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Device directory for registration endpoints
    pub store: Arc<dyn DeviceStore>,

    /// Starts and stops the monitor as subscribers come and go
    pub lifecycle: Arc<LifecycleController>,

    /// Connected live-update subscribers
    pub registry: Arc<SubscriberRegistry>,
}

impl ApiState {
    pub fn new(store: Arc<dyn DeviceStore>, lifecycle: Arc<LifecycleController>) -> Self {
        let registry = lifecycle.registry().clone();
        Self {
            store,
            lifecycle,
            registry,
        }
    }
}
