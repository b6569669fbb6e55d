//! Snapshot codec: portable export documents and their encryption envelope.

mod codec;
mod crypto;

pub use codec::{
    build_snapshot, deserialize, detect_encryption, open_plaintext, serialize, validate,
    EncryptedEnvelope, SettingsSnapshot, SnapshotDocument, SnapshotScope, SNAPSHOT_VERSION,
};
