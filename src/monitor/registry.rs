//! Live-update subscriber registry
//!
//! Each connected client is represented by a [`Subscriber`]: the sending half
//! of an unbounded channel whose receiving half is drained by that client's
//! connection task. The registry keeps the set of subscribers behind a single
//! mutex that is held only to add, remove or snapshot, never while sending.
//!
//! ## Failure policy
//!
//! `broadcast` never removes subscribers. A failed send (the connection task
//! already exited) is counted and logged; removal happens only through the
//! disconnect path calling [`SubscriberRegistry::remove`].

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

/// Identifier of a connected subscriber
pub type SubscriberId = u64;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("subscriber {0} is not registered")]
    UnknownSubscriber(SubscriberId),
}

/// One connected live-update client
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    sender: mpsc::UnboundedSender<String>,
}

impl Subscriber {
    /// Create a subscriber and the receiver its connection task drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }

    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

/// Delivery counts for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Set of currently connected subscribers
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted subscriber
    pub async fn add(&self, subscriber: Subscriber) -> SubscriberId {
        let id = subscriber.id;
        let mut subscribers = self.subscribers.lock().await;
        subscribers.push(subscriber);
        debug!("subscriber {id} registered ({} connected)", subscribers.len());
        id
    }

    /// Unregister a subscriber
    ///
    /// Removing an id that was never added (or was already removed) is an
    /// error; callers only remove after a successful `add`.
    pub async fn remove(&self, id: SubscriberId) -> Result<Subscriber, RegistryError> {
        let mut subscribers = self.subscribers.lock().await;
        let index = subscribers
            .iter()
            .position(|subscriber| subscriber.id == id)
            .ok_or(RegistryError::UnknownSubscriber(id))?;

        let subscriber = subscribers.remove(index);
        debug!("subscriber {id} removed ({} connected)", subscribers.len());
        Ok(subscriber)
    }

    /// Send `message` to every registered subscriber independently
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let targets: Vec<(SubscriberId, mpsc::UnboundedSender<String>)> = {
            let subscribers = self.subscribers.lock().await;
            subscribers
                .iter()
                .map(|subscriber| (subscriber.id, subscriber.sender.clone()))
                .collect()
        };

        let mut report = BroadcastReport::default();
        for (id, sender) in targets {
            match sender.send(message.to_string()) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    debug!("subscriber {id} is gone, skipping");
                    report.failed += 1;
                }
            }
        }

        trace!(
            "broadcast delivered to {} subscribers ({} failed)",
            report.delivered, report.failed
        );
        report
    }

    pub async fn len(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.lock().await.is_empty()
    }

    /// Drop every subscriber, which ends their connection tasks
    pub async fn close_all(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        let count = subscribers.len();
        subscribers.clear();
        count
    }
}
