//! Subscription manager for broadcasting store events.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId};

/// Internal subscription state.
struct Subscription {
    sender: Sender<StoreEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if the subscriber is gone or its
    /// buffer is full (slow consumer, will be dropped).
    fn try_send(&self, event: StoreEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription and return its event handle.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size);

        self.subscriptions
            .write()
            .insert(id, Subscription { sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.write().remove(&id);
    }

    /// Broadcast an event to all subscribers, dropping any that are gone or
    /// can no longer keep up.
    pub fn broadcast(&self, event: &StoreEvent) {
        let mut dead = Vec::new();
        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if !sub.try_send(event.clone()) {
                    dead.push(*id);
                }
            }
        }
        if !dead.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in dead {
                subs.remove(&id);
            }
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MachineId;

    #[test]
    fn test_subscribe_and_broadcast() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig::default());

        let event = StoreEvent::MachineAdded {
            id: MachineId::new(),
        };
        manager.broadcast(&event);

        assert_eq!(handle.try_recv().unwrap(), event);
        assert!(handle.try_recv().is_err());
    }

    #[test]
    fn test_slow_consumer_is_dropped() {
        let manager = SubscriptionManager::new();
        let _handle = manager.subscribe(SubscriptionConfig { buffer_size: 1 });

        manager.broadcast(&StoreEvent::DataCleared);
        assert_eq!(manager.subscription_count(), 1);

        // Second event overflows the buffer and evicts the subscriber.
        manager.broadcast(&StoreEvent::DataCleared);
        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig::default());
        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);
    }
}
