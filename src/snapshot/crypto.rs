//! Password sealing for export documents.
//!
//! AES-256-GCM over an Argon2id-derived key. The sealed text is
//! base64(salt[16] || nonce[12] || ciphertext+tag), so every file carries
//! its own salt and nonce. The GCM tag gives a hard cryptographic signal
//! for wrong passwords instead of a parse-success heuristic.

use crate::error::{Result, StoreError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use zeroize::Zeroizing;

/// Salt length in bytes.
const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

/// Argon2id memory cost in KiB.
const KDF_MEM_COST: u32 = 19_456;

/// Argon2id iteration count.
const KDF_TIME_COST: u32 = 2;

/// Argon2id parallelism.
const KDF_PARALLELISM: u32 = 1;

/// Derive a 256-bit key from the password and per-file salt.
fn derive_key(password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
    let params = Params::new(KDF_MEM_COST, KDF_TIME_COST, KDF_PARALLELISM, Some(32))
        .map_err(|e| StoreError::EncryptionFailed(format!("invalid KDF parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut *key)
        .map_err(|e| StoreError::EncryptionFailed(format!("key derivation failed: {e}")))?;
    Ok(key)
}

/// Encrypt plaintext with a password, producing the envelope's `data` string.
pub fn seal(plaintext: &[u8], password: &str) -> Result<String> {
    let salt: [u8; SALT_LEN] = rand::random();
    let nonce_bytes: [u8; NONCE_LEN] = rand::random();

    let key = derive_key(password, &salt)?;
    let key_bytes: &[u8; 32] = &key;
    let cipher = Aes256Gcm::new(key_bytes.into());
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| StoreError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(blob))
}

/// Decrypt an envelope's `data` string with a password.
///
/// A wrong password or tampered ciphertext fails the GCM tag check and is
/// reported as [`StoreError::DecryptionFailed`]; malformed encodings are
/// [`StoreError::InvalidFormat`].
pub fn open(data: &str, password: &str) -> Result<Vec<u8>> {
    let blob = BASE64
        .decode(data.trim())
        .map_err(|e| StoreError::InvalidFormat(format!("invalid base64 ciphertext: {e}")))?;

    if blob.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(StoreError::InvalidFormat(
            "ciphertext too short".to_string(),
        ));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt)?;
    let key_bytes: &[u8; 32] = &key;
    let cipher = Aes256Gcm::new(key_bytes.into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher.decrypt(nonce, ciphertext).map_err(|_| {
        StoreError::DecryptionFailed("wrong password or corrupted data".to_string())
    })
}
