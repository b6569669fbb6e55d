//! Record-by-record reconciliation of an incoming snapshot document.
//!
//! Machines are updated-if-present / inserted-if-new, history entries are
//! inserted unconditionally, and settings are merged field by field. The
//! whole pass is best-effort: a failing record lands in the result's
//! error or warning list and processing continues. Only a document-level
//! failure (bad JSON, failed validation, missing password, failed
//! decryption) aborts the import, and even that is reported through the
//! result rather than an `Err`.

use crate::error::StoreError;
use crate::snapshot::{self, SettingsSnapshot};
use crate::store::Store;
use crate::types::{validate_remote_id, CustomFieldDefinition, HistoryEntry, Machine, Settings};
use serde_json::Value;

/// Outcome of an import, for collaborator display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportResult {
    /// True iff the document decoded, validated, and the per-family pass
    /// completed. Individual record failures do not clear this flag.
    pub success: bool,
    /// Machines newly inserted (updates of existing machines don't count).
    pub imported_machines: usize,
    /// History entries newly inserted.
    pub imported_history: usize,
    /// Whether the settings merge was applied.
    pub imported_settings: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportResult {
    fn failed(message: String) -> Self {
        Self {
            errors: vec![message],
            ..Self::default()
        }
    }
}

/// Decode, validate, and merge a serialized snapshot into the store.
///
/// `bytes` is the raw file content (bare document or encrypted envelope);
/// decryption is delegated to the snapshot codec.
pub fn import_document(store: &Store, bytes: &[u8], password: Option<&str>) -> ImportResult {
    let plain = match snapshot::open_plaintext(bytes, password) {
        Ok(plain) => plain,
        Err(StoreError::PasswordRequired) => {
            return ImportResult::failed("File is encrypted but no password provided".to_string());
        }
        Err(StoreError::DecryptionFailed(_)) => {
            return ImportResult::failed("Invalid password or corrupted encrypted data".to_string());
        }
        Err(e) => return ImportResult::failed(format!("Invalid backup file: {e}")),
    };

    let value: Value = match serde_json::from_slice(&plain) {
        Ok(value) => value,
        Err(_) => {
            return ImportResult::failed("Invalid JSON format in backup file".to_string());
        }
    };

    if let Err(e) = snapshot::validate(&value) {
        return ImportResult::failed(format!(
            "Invalid backup file format ({e}). Expected: version, exportDate, machines, settings, history"
        ));
    }

    let mut result = ImportResult::default();

    merge_machines(store, &value, &mut result);
    merge_history(store, &value, &mut result);
    apply_settings(store, &value, &mut result);

    result.success = true;
    result
}

/// Best label for a raw machine value in error messages.
fn machine_label(raw: &Value) -> &str {
    raw.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
}

fn merge_machines(store: &Store, value: &Value, result: &mut ImportResult) {
    // Validated as an array by the caller.
    let raw_machines = value["machines"].as_array().cloned().unwrap_or_default();

    for raw in &raw_machines {
        let machine: Machine = match serde_json::from_value(raw.clone()) {
            Ok(machine) => machine,
            Err(e) => {
                result
                    .errors
                    .push(format!("Failed to import machine {}: {e}", machine_label(raw)));
                continue;
            }
        };

        if validate_remote_id(&machine.remote_id).is_err() {
            result.warnings.push(format!(
                "Machine {} has a malformed remote id \"{}\"",
                machine.name, machine.remote_id
            ));
        }

        // A colliding remote id on a different machine id is inserted anyway:
        // two records must coexist rather than silently merging. The caller
        // resolves the collision.
        if let Some(existing) = store.get_machine_by_remote_id(&machine.remote_id) {
            if existing.id != machine.id {
                result.warnings.push(format!(
                    "Machine {} shares remote id {} with existing machine {}",
                    machine.name, machine.remote_id, existing.name
                ));
            }
        }

        if store.get_machine(machine.id).is_some() {
            let name = machine.name.clone();
            match store.update_machine(machine) {
                Ok(()) => result
                    .warnings
                    .push(format!("Updated existing machine: {name}")),
                Err(e) => result
                    .errors
                    .push(format!("Failed to import machine {name}: {e}")),
            }
        } else {
            let name = machine.name.clone();
            match store.add_machine(machine) {
                Ok(()) => result.imported_machines += 1,
                Err(e) => result
                    .errors
                    .push(format!("Failed to import machine {name}: {e}")),
            }
        }
    }
}

fn merge_history(store: &Store, value: &Value, result: &mut ImportResult) {
    let raw_entries = value["history"].as_array().cloned().unwrap_or_default();

    for raw in &raw_entries {
        let entry: HistoryEntry = match serde_json::from_value(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                result
                    .warnings
                    .push(format!("Failed to import history entry: {e}"));
                continue;
            }
        };

        // History loss is non-critical: failures (including an entry that is
        // already present from an earlier import) are warnings.
        match store.add_history(entry) {
            Ok(()) => result.imported_history += 1,
            Err(e) => result
                .warnings
                .push(format!("Failed to import history entry: {e}")),
        }
    }
}

fn apply_settings(store: &Store, value: &Value, result: &mut ImportResult) {
    let incoming: SettingsSnapshot = match serde_json::from_value(value["settings"].clone()) {
        Ok(incoming) => incoming,
        Err(e) => {
            result
                .warnings
                .push(format!("Failed to import settings: {e}"));
            return;
        }
    };

    let current = match store.get_settings() {
        Ok(current) => current,
        Err(e) => {
            result
                .warnings
                .push(format!("Failed to import settings: {e}"));
            return;
        }
    };

    let merged = merge_settings(current, &incoming);
    match store.update_settings(merged) {
        Ok(()) => result.imported_settings = true,
        Err(e) => result
            .warnings
            .push(format!("Failed to import settings: {e}")),
    }
}

/// Field-level settings merge.
///
/// The current record's identifier always wins. Scalar preference flags take
/// the incoming value only when it is explicitly present. Categories are
/// unioned (current order first, then new distinct labels). Field
/// definitions merge by id: same id replaces, new id appends. Groups are
/// taken from the document when present, else kept.
pub fn merge_settings(current: Settings, incoming: &SettingsSnapshot) -> Settings {
    Settings {
        id: current.id,
        dark_mode: incoming.dark_mode.unwrap_or(current.dark_mode),
        auto_backup: incoming.auto_backup.unwrap_or(current.auto_backup),
        default_encryption: incoming
            .default_encryption
            .unwrap_or(current.default_encryption),
        categories: union_categories(current.categories, &incoming.categories),
        custom_field_definitions: merge_field_definitions(
            current.custom_field_definitions,
            &incoming.custom_field_definitions,
        ),
        last_backup_date: incoming.last_backup_date.or(current.last_backup_date),
        groups: incoming.groups.clone().or(current.groups),
    }
}

fn union_categories(current: Vec<String>, incoming: &[String]) -> Vec<String> {
    let mut merged = current;
    for label in incoming {
        if !merged.contains(label) {
            merged.push(label.clone());
        }
    }
    merged
}

fn merge_field_definitions(
    current: Vec<CustomFieldDefinition>,
    incoming: &[CustomFieldDefinition],
) -> Vec<CustomFieldDefinition> {
    let mut merged = current;
    for definition in incoming {
        match merged.iter_mut().find(|d| d.id == definition.id) {
            Some(existing) => *existing = definition.clone(),
            None => merged.push(definition.clone()),
        }
    }
    merged
}
