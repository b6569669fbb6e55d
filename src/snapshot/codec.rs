//! Serialization of snapshot documents and their encryption envelope.
//!
//! The outer bytes of a serialized snapshot are always valid JSON: either a
//! bare [`SnapshotDocument`] or an [`EncryptedEnvelope`] whose `encrypted`
//! flag tells callers which one they are holding. Version and export date
//! stay in cleartext on the envelope so they can be inspected without the
//! password.

use super::crypto;
use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::types::{
    CustomFieldDefinition, HistoryEntry, Machine, MachineGroup, MachineId, Settings, SETTINGS_ID,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current snapshot document format version.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Which record families a snapshot includes.
#[derive(Clone, Debug)]
pub struct SnapshotScope {
    pub include_machines: bool,
    pub include_history: bool,
    pub include_settings: bool,
    /// Restrict machines to an explicit subset of identifiers.
    /// Ignored unless `include_machines` is set; unknown ids are skipped.
    pub machine_ids: Option<Vec<MachineId>>,
}

impl SnapshotScope {
    /// Everything: all three families, no machine subset.
    pub fn full() -> Self {
        Self {
            include_machines: true,
            include_history: true,
            include_settings: true,
            machine_ids: None,
        }
    }
}

impl Default for SnapshotScope {
    fn default() -> Self {
        Self::full()
    }
}

/// Settings as they appear inside a snapshot document.
///
/// The scalar preference flags are optional so an importing merge can tell
/// "explicitly false" apart from "absent" (absent keeps the current value).
/// Exports always fill every field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_backup: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_encryption: Option<bool>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub custom_field_definitions: Vec<CustomFieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<MachineGroup>>,
}

impl From<Settings> for SettingsSnapshot {
    fn from(s: Settings) -> Self {
        Self {
            id: Some(s.id),
            dark_mode: Some(s.dark_mode),
            auto_backup: Some(s.auto_backup),
            default_encryption: Some(s.default_encryption),
            categories: s.categories,
            custom_field_definitions: s.custom_field_definitions,
            last_backup_date: s.last_backup_date,
            groups: s.groups,
        }
    }
}

impl SettingsSnapshot {
    /// Materialize a full settings record, falling back to seed defaults for
    /// absent scalar flags. Used by full-replace restores, where there is no
    /// current record to merge against.
    pub fn into_settings(self) -> Settings {
        Settings {
            id: SETTINGS_ID.to_string(),
            dark_mode: self.dark_mode.unwrap_or(false),
            auto_backup: self.auto_backup.unwrap_or(true),
            default_encryption: self.default_encryption.unwrap_or(false),
            categories: self.categories,
            custom_field_definitions: self.custom_field_definitions,
            last_backup_date: self.last_backup_date,
            groups: self.groups,
        }
    }
}

/// A full, versioned, point-in-time export of the record families.
///
/// Families excluded by the snapshot scope are present as empty collections,
/// never omitted keys, so the document shape is uniform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub machines: Vec<Machine>,
    pub history: Vec<HistoryEntry>,
    pub settings: SettingsSnapshot,
}

/// Wrapper around an encrypted, serialized [`SnapshotDocument`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub encrypted: bool,
    /// base64(salt || nonce || ciphertext+tag) over the document JSON.
    pub data: String,
    pub version: String,
    pub export_date: DateTime<Utc>,
}

/// Build a snapshot document from the store's current contents.
pub fn build_snapshot(store: &Store, scope: &SnapshotScope) -> Result<SnapshotDocument> {
    let machines = if scope.include_machines {
        match &scope.machine_ids {
            Some(ids) if !ids.is_empty() => {
                ids.iter().filter_map(|id| store.get_machine(*id)).collect()
            }
            _ => store.get_all_machines(),
        }
    } else {
        Vec::new()
    };

    let history = if scope.include_history {
        store.get_history(None)
    } else {
        Vec::new()
    };

    let settings = if scope.include_settings {
        store.get_settings()?.into()
    } else {
        SettingsSnapshot::default()
    };

    Ok(SnapshotDocument {
        version: SNAPSHOT_VERSION.to_string(),
        export_date: Utc::now(),
        machines,
        history,
        settings,
    })
}

/// Serialize a snapshot document to UTF-8 JSON bytes.
///
/// With a password, the document JSON is sealed and wrapped in an
/// [`EncryptedEnvelope`]; the envelope itself is serialized as JSON, so the
/// output is valid JSON either way.
pub fn serialize(doc: &SnapshotDocument, password: Option<&str>) -> Result<Vec<u8>> {
    let json = serde_json::to_string_pretty(doc)?;

    match password {
        None => Ok(json.into_bytes()),
        Some(password) => {
            let envelope = EncryptedEnvelope {
                encrypted: true,
                data: crypto::seal(json.as_bytes(), password)?,
                version: doc.version.clone(),
                export_date: doc.export_date,
            };
            Ok(serde_json::to_string_pretty(&envelope)?.into_bytes())
        }
    }
}

/// Unwrap serialized snapshot bytes down to plaintext document JSON.
///
/// Handles envelope detection and decryption; this is the single place
/// decryption lives, shared by [`deserialize`] and the import merge engine.
pub fn open_plaintext(bytes: &[u8], password: Option<&str>) -> Result<Vec<u8>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::InvalidFormat(format!("not valid JSON: {e}")))?;

    if value.get("encrypted").and_then(Value::as_bool) != Some(true) {
        return Ok(bytes.to_vec());
    }

    let envelope: EncryptedEnvelope = serde_json::from_value(value)
        .map_err(|e| StoreError::InvalidFormat(format!("malformed encrypted envelope: {e}")))?;

    let password = password.ok_or(StoreError::PasswordRequired)?;
    crypto::open(&envelope.data, password)
}

/// True if the bytes parse as JSON carrying the `encrypted` flag.
pub fn detect_encryption(bytes: &[u8]) -> bool {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.get("encrypted").and_then(Value::as_bool))
        == Some(true)
}

/// Structural validation of a parsed snapshot document.
///
/// Checks the document shape only: version is a string, an export date is
/// present, machines/history are arrays, settings is an object. Individual
/// records are NOT validated here; malformed ones surface as per-record
/// import errors instead of rejecting the whole document.
pub fn validate(value: &Value) -> Result<()> {
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::InvalidFormat("document is not an object".to_string()))?;

    if !obj.get("version").is_some_and(Value::is_string) {
        return Err(StoreError::InvalidFormat(
            "version is missing or not a string".to_string(),
        ));
    }
    if obj.get("exportDate").map_or(true, Value::is_null) {
        return Err(StoreError::InvalidFormat(
            "exportDate is missing".to_string(),
        ));
    }
    if !obj.get("machines").is_some_and(Value::is_array) {
        return Err(StoreError::InvalidFormat(
            "machines is missing or not an array".to_string(),
        ));
    }
    if !obj.get("history").is_some_and(Value::is_array) {
        return Err(StoreError::InvalidFormat(
            "history is missing or not an array".to_string(),
        ));
    }
    if !obj.get("settings").is_some_and(Value::is_object) {
        return Err(StoreError::InvalidFormat(
            "settings is missing or not an object".to_string(),
        ));
    }

    Ok(())
}

/// Strict typed decode of serialized snapshot bytes.
///
/// Used where the whole document must be well-formed (auto-backup restore,
/// round-trip checks). The merge engine instead decodes record-by-record on
/// top of [`open_plaintext`] so single bad records stay soft errors.
pub fn deserialize(bytes: &[u8], password: Option<&str>) -> Result<SnapshotDocument> {
    let plain = open_plaintext(bytes, password)?;
    let value: Value = serde_json::from_slice(&plain)
        .map_err(|e| StoreError::InvalidFormat(format!("not valid JSON: {e}")))?;
    validate(&value)?;
    serde_json::from_value(value).map_err(|e| StoreError::Deserialization(e.to_string()))
}
