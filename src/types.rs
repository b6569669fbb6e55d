//! Core types for the machine registry.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Fixed identifier of the settings singleton record.
pub const SETTINGS_ID: &str = "app-settings";

/// Unique identifier for a machine.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId(pub Uuid);

impl MachineId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        MachineId(Uuid::new_v4())
    }
}

impl Default for MachineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MachineId({})", self.0)
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a connection history entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistoryId(pub Uuid);

impl HistoryId {
    pub fn new() -> Self {
        HistoryId(Uuid::new_v4())
    }
}

impl Default for HistoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HistoryId({})", self.0)
    }
}

impl fmt::Display for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a custom field or field definition.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(pub Uuid);

impl FieldId {
    pub fn new() -> Self {
        FieldId(Uuid::new_v4())
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldId({})", self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a machine group.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

impl GroupId {
    pub fn new() -> Self {
        GroupId(Uuid::new_v4())
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value type of a custom field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Password,
    Url,
    Number,
}

impl Default for FieldKind {
    fn default() -> Self {
        FieldKind::Text
    }
}

/// A custom key/value field attached to a machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: FieldId,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

/// A remote-desktop connection target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    /// Unique identifier, assigned at creation and never reused.
    pub id: MachineId,

    /// Display name.
    pub name: String,

    /// Remote-desktop numeric identifier (digits only, unique across the store).
    pub remote_id: String,

    /// Optional network address (IP or hostname).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Ordered list of access passwords.
    pub passwords: Vec<String>,

    /// Free-text notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Category labels.
    pub categories: Vec<String>,

    /// Free-form tags.
    pub tags: Vec<String>,

    /// Per-machine custom field values.
    pub custom_fields: Vec<CustomField>,

    /// Creation time (immutable).
    pub created_at: DateTime<Utc>,

    /// Bumped by the store on every update.
    pub updated_at: DateTime<Utc>,

    /// Last time a connection was launched against this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,

    /// Number of successful connections.
    pub connection_count: u64,
}

impl Machine {
    /// Create a machine with a fresh id and current timestamps.
    pub fn new(name: impl Into<String>, remote_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MachineId::new(),
            name: name.into(),
            remote_id: remote_id.into(),
            address: None,
            passwords: Vec::new(),
            notes: None,
            categories: Vec::new(),
            tags: Vec::new(),
            custom_fields: Vec::new(),
            created_at: now,
            updated_at: now,
            last_accessed: None,
            connection_count: 0,
        }
    }
}

/// Check that a remote-desktop identifier is digits only and non-empty.
///
/// The store itself never runs this check; the creation path and callers
/// validating imports do.
pub fn validate_remote_id(remote_id: &str) -> Result<()> {
    if remote_id.is_empty() || !remote_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StoreError::InvalidRemoteId(remote_id.to_string()));
    }
    Ok(())
}

/// Outcome of a connection launch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionAction {
    LaunchAttempt,
    LaunchSuccess,
    LaunchFailure,
}

/// An immutable log record of a connection attempt.
///
/// `machine_id` is a soft reference: it may dangle after the machine is
/// deleted, and nothing enforces it at the storage layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub machine_id: MachineId,
    pub timestamp: DateTime<Utc>,
    pub action: ConnectionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HistoryEntry {
    /// Create an entry with a fresh id stamped now.
    pub fn new(machine_id: MachineId, action: ConnectionAction, notes: Option<String>) -> Self {
        Self {
            id: HistoryId::new(),
            machine_id,
            timestamp: Utc::now(),
            action,
            notes,
        }
    }
}

/// Definition of a custom field, distinct from per-machine field values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFieldDefinition {
    pub id: FieldId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// A named grouping of machines.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cached member count; recomputed by callers, not by the store.
    pub member_count: u64,
}

/// The application settings singleton.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Always [`SETTINGS_ID`].
    pub id: String,
    pub dark_mode: bool,
    pub auto_backup: bool,
    pub default_encryption: bool,
    /// Known category labels.
    pub categories: Vec<String>,
    pub custom_field_definitions: Vec<CustomFieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<MachineGroup>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            dark_mode: false,
            auto_backup: true,
            default_encryption: false,
            categories: vec![
                "Work".to_string(),
                "Personal".to_string(),
                "Server".to_string(),
                "Development".to_string(),
            ],
            custom_field_definitions: Vec::new(),
            last_backup_date: None,
            groups: None,
        }
    }
}

/// Per-family record counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub machines: usize,
    pub history: usize,
    pub settings: usize,
}

impl StoreCounts {
    /// True when no machines and no history entries exist.
    ///
    /// The settings singleton does not count: it is reseeded on clear, so
    /// its presence says nothing about whether user data survived.
    pub fn is_empty(&self) -> bool {
        self.machines == 0 && self.history == 0
    }
}
