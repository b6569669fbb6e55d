//! Best-effort auto-backup into the secondary key-value store.
//!
//! The sentinel keeps a derived full snapshot of the primary store under a
//! fixed key and restores it when the primary store turns up empty at
//! startup. It is a convenience safety net, never a source of truth while
//! the primary store has data: every failure here is caught and logged,
//! and neither startup nor normal CRUD is ever blocked by it.

use crate::error::{Result, StoreError};
use crate::snapshot::{self, SnapshotDocument, SnapshotScope};
use crate::store::{Store, StoreContents};
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::kv::KvStore;

/// Fixed key of the backup snapshot in the secondary store.
pub const BACKUP_KEY: &str = "deskvault.backup";

/// One-shot flag suppressing the next startup restore.
pub const SKIP_RESTORE_KEY: &str = "deskvault.skipAutoRestore";

/// Startup summary, consumed once by the application shell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackupStatus {
    /// Whether the primary store was restored from the secondary backup.
    pub restored: bool,
    /// Whether a backup exists in the secondary store.
    pub has_backup: bool,
}

/// Details about the stored backup, for collaborator display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackupInfo {
    pub has_backup: bool,
    pub backup_date: Option<DateTime<Utc>>,
    /// Whether the backup is newer than the settings' last-backup stamp.
    pub is_newer: bool,
}

/// Checksummed wrapper around the snapshot JSON kept in the secondary store.
#[derive(Debug, Serialize, Deserialize)]
struct BackupRecord {
    /// CRC32 of `payload`, verified on read.
    checksum: u32,
    /// The snapshot document as JSON text.
    payload: String,
}

/// The auto-backup sentinel.
///
/// Holds a subscription to the store's change feed; collaborators call
/// [`Sentinel::tick`] opportunistically (after operations, on a timer) to
/// let it refresh the backup when data changed.
pub struct Sentinel {
    store: Arc<Store>,
    kv: Arc<dyn KvStore>,
    events: SubscriptionHandle,
}

impl Sentinel {
    pub fn new(store: Arc<Store>, kv: Arc<dyn KvStore>) -> Self {
        let events = store.subscribe(SubscriptionConfig::default());
        Self { store, kv, events }
    }

    /// Startup check: restore an empty primary store from the secondary
    /// backup, or make sure a backup exists for a non-empty one.
    ///
    /// Never fails; any error degrades to "nothing restored, no backup".
    pub fn initialize(&self) -> BackupStatus {
        match self.initialize_inner() {
            Ok(status) => status,
            Err(e) => {
                warn!("auto-backup initialization failed: {e}");
                BackupStatus::default()
            }
        }
    }

    fn initialize_inner(&self) -> Result<BackupStatus> {
        if self.consume_skip_flag()? {
            debug!("skipping auto-restore after explicit data clear");
            return Ok(BackupStatus::default());
        }

        if self.store.counts().is_empty() {
            let restored = self.restore_from_backup();
            let has_backup = self.kv.get(BACKUP_KEY)?.is_some();
            // Whatever the restore emitted is not new data to back up.
            self.events.drain();
            return Ok(BackupStatus {
                restored,
                has_backup,
            });
        }

        if self.kv.get(BACKUP_KEY)?.is_none() {
            if let Err(e) = self.create_backup() {
                warn!("initial auto-backup failed: {e}");
            }
        }
        Ok(BackupStatus {
            restored: false,
            has_backup: true,
        })
    }

    /// Opportunistic refresh: if any data change arrived since the last call
    /// and auto-backup is enabled, write a fresh snapshot. Returns whether a
    /// backup was written. Never propagates failures.
    pub fn tick(&self) -> bool {
        let mut changes = 0;
        while let Ok(event) = self.events.try_recv() {
            if event.is_data_change() {
                changes += 1;
            }
        }
        if changes == 0 {
            return false;
        }

        let auto_backup = self
            .store
            .get_settings()
            .map(|s| s.auto_backup)
            .unwrap_or(true);
        if !auto_backup {
            debug!("auto-backup disabled; skipping refresh");
            return false;
        }

        match self.create_backup() {
            Ok(()) => true,
            Err(e) => {
                warn!("auto-backup refresh failed: {e}");
                false
            }
        }
    }

    /// Build a full unencrypted snapshot and write it under the fixed key,
    /// stamping the settings' last-backup date.
    pub fn create_backup(&self) -> Result<()> {
        let doc = snapshot::build_snapshot(&self.store, &SnapshotScope::full())?;
        let payload = serde_json::to_string(&doc)?;
        let record = BackupRecord {
            checksum: crc32fast::hash(payload.as_bytes()),
            payload,
        };
        self.kv.set(BACKUP_KEY, &serde_json::to_string(&record)?)?;

        let mut settings = self.store.get_settings()?;
        settings.last_backup_date = Some(Utc::now());
        self.store.update_settings(settings)?;

        // Swallow the echo of our own settings write so the next tick does
        // not treat it as fresh data.
        self.events.drain();

        debug!("auto-backup refreshed");
        Ok(())
    }

    /// Replace the primary store's contents from the secondary backup.
    ///
    /// Full replace via the store's destructive import primitive, not a
    /// merge: this only runs when the primary store is empty. Returns
    /// whether a restore happened; failures are logged and reported as
    /// `false`.
    pub fn restore_from_backup(&self) -> bool {
        match self.restore_inner() {
            Ok(restored) => restored,
            Err(e) => {
                warn!("restore from auto-backup failed: {e}");
                false
            }
        }
    }

    fn restore_inner(&self) -> Result<bool> {
        let doc = match self.read_backup()? {
            Some(doc) => doc,
            None => {
                debug!("no auto-backup present");
                return Ok(false);
            }
        };

        self.store.import_data(StoreContents {
            machines: doc.machines,
            history: doc.history,
            settings: doc.settings.into_settings(),
        })?;
        Ok(true)
    }

    /// Read, checksum-verify, and decode the stored backup.
    fn read_backup(&self) -> Result<Option<SnapshotDocument>> {
        let raw = match self.kv.get(BACKUP_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let record: BackupRecord = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corruption(format!("unreadable backup record: {e}")))?;

        let got = crc32fast::hash(record.payload.as_bytes());
        if got != record.checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: record.checksum,
                got,
            });
        }

        let doc = snapshot::deserialize(record.payload.as_bytes(), None)?;
        Ok(Some(doc))
    }

    /// The stored backup, if present and intact.
    pub fn latest_backup(&self) -> Option<SnapshotDocument> {
        match self.read_backup() {
            Ok(doc) => doc,
            Err(e) => {
                warn!("failed to read auto-backup: {e}");
                None
            }
        }
    }

    /// Backup presence and freshness relative to the settings' last-backup
    /// stamp.
    pub fn check_status(&self) -> BackupInfo {
        let doc = match self.latest_backup() {
            Some(doc) => doc,
            None => return BackupInfo::default(),
        };

        let last_backup_date = self
            .store
            .get_settings()
            .ok()
            .and_then(|s| s.last_backup_date);

        BackupInfo {
            has_backup: true,
            backup_date: Some(doc.export_date),
            is_newer: last_backup_date.map_or(true, |stamp| doc.export_date > stamp),
        }
    }

    /// Size of the stored backup record in bytes.
    pub fn backup_size(&self) -> u64 {
        match self.kv.get(BACKUP_KEY) {
            Ok(Some(raw)) => raw.len() as u64,
            Ok(None) => 0,
            Err(e) => {
                warn!("failed to size auto-backup: {e}");
                0
            }
        }
    }

    /// Remove the stored backup.
    pub fn clear_backup(&self) -> Result<()> {
        self.kv.remove(BACKUP_KEY)
    }

    /// Arm the one-shot skip flag. The explicit clear-all-data flow calls
    /// this right before wiping the primary store so the next startup does
    /// not immediately resurrect the cleared data.
    pub fn skip_next_restore(&self) -> Result<()> {
        self.kv.set(SKIP_RESTORE_KEY, "true")
    }

    /// Read-then-delete the skip flag. Consumed at most once.
    fn consume_skip_flag(&self) -> Result<bool> {
        if self.kv.get(SKIP_RESTORE_KEY)?.as_deref() == Some("true") {
            self.kv.remove(SKIP_RESTORE_KEY)?;
            return Ok(true);
        }
        Ok(false)
    }
}
