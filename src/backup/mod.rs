//! Auto-backup sentinel and its secondary key-value store.

mod kv;
mod sentinel;

pub use kv::{FileKvStore, KvStore, MemoryKvStore};
pub use sentinel::{BackupInfo, BackupStatus, Sentinel, BACKUP_KEY, SKIP_RESTORE_KEY};
