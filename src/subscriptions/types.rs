//! Subscription types for live store updates.

use crate::types::{HistoryId, MachineId};
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before the subscriber is dropped.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Events emitted on store mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    MachineAdded { id: MachineId },
    MachineUpdated { id: MachineId },
    MachineDeleted { id: MachineId },
    HistoryAppended { id: HistoryId, machine_id: MachineId },
    HistoryDeleted { id: HistoryId },
    HistoryCleared,
    SettingsUpdated,
    /// Store contents were replaced wholesale by an import or restore.
    DataImported { machines: usize, history: usize },
    /// All families were cleared and default settings reseeded.
    DataCleared,
}

impl StoreEvent {
    /// True for events that change user data and should refresh the
    /// auto-backup snapshot.
    pub fn is_data_change(&self) -> bool {
        // Every current variant mutates persisted data; the method exists so
        // future read-only events (e.g. subscription lifecycle) have a place
        // to opt out.
        true
    }
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to a subscription's event stream.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<StoreEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<StoreEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain all buffered events, returning how many were pending.
    pub fn drain(&self) -> usize {
        let mut n = 0;
        while self.receiver.try_recv().is_ok() {
            n += 1;
        }
        n
    }
}
