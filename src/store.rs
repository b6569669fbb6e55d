//! Persistent store adapter owning the canonical record families.
//!
//! The store keeps three record families (machines, connection history,
//! settings) in memory and commits them to a single length-prefixed
//! MessagePack file on every mutation. Commits go through a temp file and
//! rename, so the multi-family file is replaced whole or not at all — this
//! is what makes [`Store::import_data`]'s clear-then-insert atomic across
//! families even through a crash.

use crate::error::{Result, StoreError};
use crate::subscriptions::{
    StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
use crate::types::{
    ConnectionAction, HistoryEntry, HistoryId, Machine, MachineId, Settings, StoreCounts,
};
use chrono::Utc;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the store data file.
const STORE_MAGIC: &[u8; 4] = b"DVS\0";

/// Current store data file format version.
const STORE_VERSION: u8 = 1;

/// Data file name inside the store directory.
const DATA_FILE: &str = "store.bin";

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base directory for the store.
    pub path: PathBuf,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./store"),
            create_if_missing: true,
        }
    }
}

/// The three record families returned by [`Store::export_all_data`] and
/// consumed by [`Store::import_data`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoreContents {
    pub machines: Vec<Machine>,
    pub history: Vec<HistoryEntry>,
    pub settings: Settings,
}

/// On-disk body of the store data file.
///
/// BTreeMaps keep iteration deterministic, which in turn keeps snapshot
/// documents stable across exports of unchanged data.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Families {
    machines: BTreeMap<MachineId, Machine>,
    history: BTreeMap<HistoryId, HistoryEntry>,
    settings: Option<Settings>,
}

/// The persistent store adapter.
///
/// Exclusively owns the canonical copies of all three record families; no
/// other component touches the data file directly.
pub struct Store {
    /// Store configuration.
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// In-memory record families, mirrored to disk on every commit.
    families: RwLock<Families>,

    /// Event broadcast for data-change subscribers.
    subscriptions: SubscriptionManager,
}

impl Store {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.join(DATA_FILE).exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store with default settings seeded.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        let lock_file = Self::acquire_lock(&config.path)?;

        let store = Self {
            config,
            _lock_file: lock_file,
            families: RwLock::new(Families {
                settings: Some(Settings::default()),
                ..Families::default()
            }),
            subscriptions: SubscriptionManager::new(),
        };

        let families = store.families.read().clone();
        store.persist(&families)?;
        Ok(store)
    }

    /// Open an existing store.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let lock_file = Self::acquire_lock(&config.path)?;
        let families = Self::load_data_file(&config.path.join(DATA_FILE))?;

        Ok(Self {
            config,
            _lock_file: lock_file,
            families: RwLock::new(families),
            subscriptions: SubscriptionManager::new(),
        })
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;
        file.try_lock_exclusive().map_err(|_| StoreError::Locked)?;
        Ok(file)
    }

    fn load_data_file(path: &Path) -> Result<Families> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes) as usize;

        let mut encoded = vec![0u8; len];
        file.read_exact(&mut encoded)?;

        let families: Families = rmp_serde::from_slice(&encoded)
            .map_err(|e| StoreError::Corruption(e.to_string()))?;
        Ok(families)
    }

    /// Commit a family set to disk: temp file, sync, rename.
    fn persist(&self, families: &Families) -> Result<()> {
        let encoded =
            rmp_serde::to_vec_named(families).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp_path = self.config.path.join(format!("{DATA_FILE}.tmp"));
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, self.config.path.join(DATA_FILE))?;
        Ok(())
    }

    /// Apply a prepared family set as the new canonical state.
    ///
    /// Disk first, memory second: if the commit fails, the in-memory view
    /// still matches the file on disk.
    fn commit(&self, next: Families, event: StoreEvent) -> Result<()> {
        {
            let mut families = self.families.write();
            self.persist(&next)?;
            *families = next;
        }
        self.subscriptions.broadcast(&event);
        Ok(())
    }

    // --- Machine Operations ---

    /// Add a new machine.
    ///
    /// Fails with [`StoreError::MachineExists`] on a duplicate identifier.
    /// Remote-desktop-id uniqueness is not checked here; that invariant
    /// belongs to the creation path and the merge engine.
    pub fn add_machine(&self, machine: Machine) -> Result<()> {
        let id = machine.id;
        let mut next = self.families.read().clone();
        if next.machines.contains_key(&id) {
            return Err(StoreError::MachineExists(id));
        }
        next.machines.insert(id, machine);
        self.commit(next, StoreEvent::MachineAdded { id })
    }

    /// Overwrite a machine by identifier, stamping its update timestamp.
    ///
    /// Fails with [`StoreError::MachineNotFound`] if the identifier is
    /// absent; this store does not upsert.
    pub fn update_machine(&self, mut machine: Machine) -> Result<()> {
        let id = machine.id;
        let mut next = self.families.read().clone();
        if !next.machines.contains_key(&id) {
            return Err(StoreError::MachineNotFound(id));
        }
        machine.updated_at = Utc::now();
        next.machines.insert(id, machine);
        self.commit(next, StoreEvent::MachineUpdated { id })
    }

    /// Get a machine by identifier.
    pub fn get_machine(&self, id: MachineId) -> Option<Machine> {
        self.families.read().machines.get(&id).cloned()
    }

    /// Get all machines in identifier order.
    pub fn get_all_machines(&self) -> Vec<Machine> {
        self.families.read().machines.values().cloned().collect()
    }

    /// Look up a machine by its remote-desktop identifier.
    ///
    /// Returns the first match in identifier order. Duplicates should not
    /// occur given the uniqueness invariant, but the lookup tolerates them.
    pub fn get_machine_by_remote_id(&self, remote_id: &str) -> Option<Machine> {
        self.families
            .read()
            .machines
            .values()
            .find(|m| m.remote_id == remote_id)
            .cloned()
    }

    /// True if any machine other than `exclude` already uses `remote_id`.
    pub fn remote_id_in_use(&self, remote_id: &str, exclude: Option<MachineId>) -> bool {
        self.families
            .read()
            .machines
            .values()
            .any(|m| m.remote_id == remote_id && Some(m.id) != exclude)
    }

    /// Case-insensitive search over name, remote id, address, notes, and tags.
    pub fn search_machines(&self, term: &str) -> Vec<Machine> {
        let term = term.to_lowercase();
        self.families
            .read()
            .machines
            .values()
            .filter(|m| {
                m.name.to_lowercase().contains(&term)
                    || m.remote_id.to_lowercase().contains(&term)
                    || m.address
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(&term))
                    || m.notes
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
                    || m.tags.iter().any(|t| t.to_lowercase().contains(&term))
            })
            .cloned()
            .collect()
    }

    /// Get machines carrying the given category label.
    pub fn get_machines_by_category(&self, category: &str) -> Vec<Machine> {
        self.families
            .read()
            .machines
            .values()
            .filter(|m| m.categories.iter().any(|c| c == category))
            .cloned()
            .collect()
    }

    /// Delete a machine. Idempotent; never cascades to history entries,
    /// which keep their (now dangling) machine reference.
    pub fn delete_machine(&self, id: MachineId) -> Result<()> {
        let mut next = self.families.read().clone();
        if next.machines.remove(&id).is_none() {
            return Ok(());
        }
        self.commit(next, StoreEvent::MachineDeleted { id })
    }

    // --- History Operations ---

    /// Append a connection history entry.
    pub fn add_history(&self, entry: HistoryEntry) -> Result<()> {
        let id = entry.id;
        let machine_id = entry.machine_id;
        let mut next = self.families.read().clone();
        if next.history.contains_key(&id) {
            return Err(StoreError::HistoryEntryExists(id));
        }
        next.history.insert(id, entry);
        self.commit(next, StoreEvent::HistoryAppended { id, machine_id })
    }

    /// Get history entries, optionally scoped to one machine, ordered by
    /// timestamp.
    pub fn get_history(&self, machine_id: Option<MachineId>) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .families
            .read()
            .history
            .values()
            .filter(|e| machine_id.map_or(true, |id| e.machine_id == id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Delete a single history entry. Idempotent.
    pub fn delete_history(&self, id: HistoryId) -> Result<()> {
        let mut next = self.families.read().clone();
        if next.history.remove(&id).is_none() {
            return Ok(());
        }
        self.commit(next, StoreEvent::HistoryDeleted { id })
    }

    /// Clear history entries, optionally scoped to one machine.
    pub fn clear_history(&self, machine_id: Option<MachineId>) -> Result<()> {
        let mut next = self.families.read().clone();
        match machine_id {
            Some(id) => next.history.retain(|_, e| e.machine_id != id),
            None => next.history.clear(),
        }
        self.commit(next, StoreEvent::HistoryCleared)
    }

    // --- Settings Operations ---

    /// Get the settings singleton.
    pub fn get_settings(&self) -> Result<Settings> {
        self.families
            .read()
            .settings
            .clone()
            .ok_or(StoreError::SettingsNotFound)
    }

    /// Upsert the settings singleton.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        let mut next = self.families.read().clone();
        next.settings = Some(settings);
        self.commit(next, StoreEvent::SettingsUpdated)
    }

    // --- Bulk Operations ---

    /// Per-family record counts.
    pub fn counts(&self) -> StoreCounts {
        let families = self.families.read();
        StoreCounts {
            machines: families.machines.len(),
            history: families.history.len(),
            settings: usize::from(families.settings.is_some()),
        }
    }

    /// Read all three record families in one consistent view.
    pub fn export_all_data(&self) -> Result<StoreContents> {
        let families = self.families.read();
        let settings = families
            .settings
            .clone()
            .ok_or(StoreError::SettingsNotFound)?;
        Ok(StoreContents {
            machines: families.machines.values().cloned().collect(),
            history: families.history.values().cloned().collect(),
            settings,
        })
    }

    /// Destructively replace all three families with the given contents as
    /// one commit.
    ///
    /// This is the low-level restore primitive. The merge engine never calls
    /// it; only a restore-from-auto-backup does.
    pub fn import_data(&self, contents: StoreContents) -> Result<()> {
        let machine_count = contents.machines.len();
        let history_count = contents.history.len();

        let mut next = Families::default();
        for machine in contents.machines {
            next.machines.insert(machine.id, machine);
        }
        for entry in contents.history {
            next.history.insert(entry.id, entry);
        }
        next.settings = Some(contents.settings);

        self.commit(
            next,
            StoreEvent::DataImported {
                machines: machine_count,
                history: history_count,
            },
        )
    }

    /// Clear all three families and reseed default settings.
    pub fn clear_all_data(&self) -> Result<()> {
        let next = Families {
            settings: Some(Settings::default()),
            ..Families::default()
        };
        self.commit(next, StoreEvent::DataCleared)
    }

    // --- Connection Tracking ---

    /// Append a history entry for a launch attempt, then update the target
    /// machine's last-accessed timestamp and (on success only) bump its
    /// connection count. The machine may be gone; the entry is kept anyway.
    pub fn log_connection_attempt(
        &self,
        machine_id: MachineId,
        action: ConnectionAction,
        notes: Option<String>,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry::new(machine_id, action, notes);
        self.add_history(entry.clone())?;

        if let Some(mut machine) = self.get_machine(machine_id) {
            machine.last_accessed = Some(Utc::now());
            if action == ConnectionAction::LaunchSuccess {
                machine.connection_count += 1;
            }
            self.update_machine(machine)?;
        }

        Ok(entry)
    }

    // --- Subscriptions ---

    /// Subscribe to store mutation events.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id)
    }
}
