use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, trace, warn};

/// A collection changed. `new_value` is the serialized collection, or `None`
/// when the key was cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub key: String,
    pub new_value: Option<String>,
}

pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Typed publish/subscribe bus for collection changes.
///
/// Local delivery is synchronous and in subscription order. Every event is
/// also published on a bounded broadcast channel standing in for the
/// cross-tab transport; that path is best-effort and lossy.
pub struct ChangeNotifier {
    listeners: Mutex<HashMap<String, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
    bridge: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeNotifier {
    pub fn new(bridge_capacity: usize) -> Self {
        let (bridge, _) = broadcast::channel(bridge_capacity.max(1));
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            bridge,
        }
    }

    pub fn subscribe<F>(&self, key: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        debug!(key, subscription = id.0, "listener subscribed");
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut map = self.listeners.lock();
        let mut removed = false;
        for list in map.values_mut() {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            removed |= list.len() != before;
        }
        map.retain(|_, list| !list.is_empty());
        removed
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.lock().get(key).map_or(0, Vec::len)
    }

    /// Delivers to local listeners and publishes on the cross-tab bridge.
    pub fn notify(&self, key: &str, new_value: Option<String>) {
        let event = ChangeEvent {
            key: key.to_string(),
            new_value,
        };
        self.dispatch(&event);

        // No receivers is normal when nothing bridges this notifier.
        if self.bridge.send(event).is_err() {
            trace!(key, "no bridge receivers");
        }
    }

    /// Receiver end of the cross-tab bridge.
    pub fn bridge(&self) -> broadcast::Receiver<ChangeEvent> {
        self.bridge.subscribe()
    }

    /// Replays events from another notifier's bridge into local listeners
    /// until that bridge closes. Relayed events are not re-published.
    pub async fn relay_from(&self, mut rx: broadcast::Receiver<ChangeEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.dispatch(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "bridge receiver lagged; change events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("bridge closed; relay finished");
                    return;
                }
            }
        }
    }

    fn dispatch(&self, event: &ChangeEvent) {
        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers: Vec<Listener> = self
            .listeners
            .lock()
            .get(&event.key)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        trace!(key = %event.key, listeners = handlers.len(), "dispatching change event");

        for handler in handlers {
            handler(event);
        }
    }
}
