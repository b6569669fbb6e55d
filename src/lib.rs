//! # deskvault
//!
//! A local registry of remote-desktop connection targets ("machines") with
//! credentials, metadata, and usage history, plus a layered backup
//! subsystem: versioned, optionally password-encrypted snapshot documents,
//! merge-style import with conflict resolution, and an opportunistic
//! auto-backup into a secondary key-value store that heals an empty primary
//! store at startup.
//!
//! ## Core Concepts
//!
//! - **Store**: the persistent adapter owning the three record families
//!   (machines, connection history, settings)
//! - **Snapshot**: a full, versioned, point-in-time export document,
//!   optionally sealed with a password
//! - **Merge**: record-by-record reconciliation of an incoming snapshot
//!   against the current store
//! - **Sentinel**: the best-effort auto-backup safety net
//!
//! ## Example
//!
//! ```ignore
//! use deskvault::{ExportOptions, Machine, Store, StoreConfig};
//!
//! let store = Store::open_or_create(StoreConfig {
//!     path: "./registry".into(),
//!     ..Default::default()
//! })?;
//!
//! store.add_machine(Machine::new("office desktop", "123456789"))?;
//!
//! // Export everything, encrypted.
//! let bytes = deskvault::export::export_data(&store, &ExportOptions {
//!     encrypt: true,
//!     password: Some("hunter2".into()),
//!     ..Default::default()
//! })?;
//! ```

pub mod backup;
pub mod error;
pub mod export;
pub mod import;
pub mod snapshot;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use backup::{
    BackupInfo, BackupStatus, FileKvStore, KvStore, MemoryKvStore, Sentinel, BACKUP_KEY,
    SKIP_RESTORE_KEY,
};
pub use error::{Result, StoreError};
pub use export::{ExportOptions, ExportSummary};
pub use import::{import_document, merge_settings, ImportResult};
pub use snapshot::{
    build_snapshot, deserialize, serialize, validate, EncryptedEnvelope, SettingsSnapshot,
    SnapshotDocument, SnapshotScope, SNAPSHOT_VERSION,
};
pub use store::{Store, StoreConfig, StoreContents};
pub use subscriptions::{
    StoreEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager,
};
pub use types::*;
