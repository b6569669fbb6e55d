//! Collaborator-facing export/import surface.
//!
//! UI shims hand an [`ExportOptions`] here to get downloadable bytes and a
//! filename, or raw file bytes plus an optional password to run an import.

use crate::error::{Result, StoreError};
use crate::import::{self, ImportResult};
use crate::snapshot::{self, SnapshotScope};
use crate::store::Store;
use crate::types::MachineId;
use chrono::Utc;

/// What to include in an export and how to protect it.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub include_machines: bool,
    pub include_settings: bool,
    pub include_history: bool,
    /// Restrict the export to these machines; `None` or empty means all.
    pub selected_machine_ids: Option<Vec<MachineId>>,
    pub encrypt: bool,
    pub password: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_machines: true,
            include_settings: true,
            include_history: true,
            selected_machine_ids: None,
            encrypt: false,
            password: None,
        }
    }
}

impl ExportOptions {
    fn scope(&self) -> SnapshotScope {
        SnapshotScope {
            include_machines: self.include_machines,
            include_history: self.include_history,
            include_settings: self.include_settings,
            machine_ids: self.selected_machine_ids.clone(),
        }
    }

    fn is_selection(&self) -> bool {
        self.selected_machine_ids
            .as_ref()
            .is_some_and(|ids| !ids.is_empty())
    }
}

/// Summary of what an export would contain, for confirmation dialogs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub machine_count: usize,
    pub has_settings: bool,
    pub has_history: bool,
    pub estimated_size: String,
}

/// Build and serialize a snapshot per the options.
///
/// Fails with [`StoreError::PasswordRequired`] when encryption is requested
/// without a password.
pub fn export_data(store: &Store, options: &ExportOptions) -> Result<Vec<u8>> {
    let password = match (options.encrypt, options.password.as_deref()) {
        (false, _) => None,
        (true, Some(password)) if !password.is_empty() => Some(password),
        (true, _) => return Err(StoreError::PasswordRequired),
    };

    let doc = snapshot::build_snapshot(store, &options.scope())?;
    snapshot::serialize(&doc, password)
}

/// Filename for a download, encoding scope, encryption state, and time:
/// `machine-backup-{all|selected}-{plain|encrypted}-{timestamp}.json`.
pub fn export_filename(options: &ExportOptions) -> String {
    let scope = if options.is_selection() { "selected" } else { "all" };
    let encryption = if options.encrypt { "encrypted" } else { "plain" };
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    format!("machine-backup-{scope}-{encryption}-{timestamp}.json")
}

/// Decode, validate, and merge an uploaded backup file into the store.
pub fn import_file(store: &Store, bytes: &[u8], password: Option<&str>) -> ImportResult {
    import::import_document(store, bytes, password)
}

/// What an export with these options would contain.
pub fn export_summary(store: &Store, options: &ExportOptions) -> ExportSummary {
    let machine_count = if options.include_machines {
        match &options.selected_machine_ids {
            Some(ids) if !ids.is_empty() => ids.len(),
            _ => store.get_all_machines().len(),
        }
    } else {
        0
    };

    let has_history = options.include_history && !store.get_history(None).is_empty();

    // Rough size estimate for display only.
    let estimated_bytes = machine_count as u64 * 500
        + if options.include_settings { 1000 } else { 0 }
        + if has_history { 200 } else { 0 };

    ExportSummary {
        machine_count,
        has_settings: options.include_settings,
        has_history,
        estimated_size: format_size(estimated_bytes),
    }
}

/// Human-readable byte size.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = (bytes as f64).log(1024.0).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    format!("{:.2} {}", value, UNITS[exponent])
}
