// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Cryptographic operations for the encrypted secrets file.
//!
//! On-disk format (JSON):
//! - `salt`: base64, 16 random bytes
//! - `nonce`: base64, 96-bit AES-GCM nonce
//! - `data`: base64, AES-256-GCM ciphertext of the JSON `{key -> value}` map
//!
//! The key is derived with Argon2id from the master key and the per-file
//! salt. The cost parameters are deliberately fixed constants; they are not
//! configurable and must not be lowered. Every mutation re-generates salt and
//! nonce, so a nonce is never reused under the same derived key.

use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

pub const KEY_LENGTH: usize = 32; // AES-256
pub const NONCE_LENGTH: usize = 12; // Recommended size for AES-GCM
pub const SALT_LENGTH: usize = 16;

// Argon2id cost parameters. Fixed by design; never expose through config.
pub const ARGON2_MEMORY_KIB: u32 = 64 * 1024;
pub const ARGON2_ITERATIONS: u32 = 3;
pub const ARGON2_PARALLELISM: u32 = 4;

/// The serialised shape of the encrypted secrets file.
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedFile {
    salt: String,
    nonce: String,
    data: String,
}

fn argon2() -> Result<Argon2<'static>> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| Error::Encryption(format!("invalid Argon2 params: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Derive the 256-bit file key from the master key and a salt.
pub fn derive_key(master_key: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut key = Zeroizing::new(vec![0u8; KEY_LENGTH]);
    argon2()?
        .hash_password_into(master_key, salt, &mut key)
        .map_err(|e| Error::Encryption(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Encrypt the secret map into the full on-disk file content.
///
/// A fresh salt and nonce are generated on every call. All intermediate
/// plaintext and key material is zeroed before returning.
pub fn encrypt_secret_map(
    map: &BTreeMap<String, String>,
    master_key: &[u8],
) -> Result<Vec<u8>> {
    let salt = generate_salt();
    let key = derive_key(master_key, &salt)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| Error::Encryption(format!("invalid key material: {}", e)))?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = Zeroizing::new(serde_json::to_vec(map)?);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|e| Error::Encryption(format!("encryption failed: {}", e)))?;

    let file = EncryptedFile {
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce_bytes),
        data: STANDARD.encode(&ciphertext),
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

/// Decrypt the on-disk file content back into the secret map.
///
/// Authentication failures are reported as a single generic message so the
/// caller cannot distinguish a wrong master key from tampered ciphertext.
pub fn decrypt_secret_map(
    content: &[u8],
    master_key: &[u8],
) -> Result<BTreeMap<String, String>> {
    let file: EncryptedFile = serde_json::from_slice(content)
        .map_err(|e| Error::Encryption(format!("unreadable secrets file: {}", e)))?;

    let salt = STANDARD
        .decode(file.salt.as_bytes())
        .map_err(|e| Error::Encryption(format!("failed to decode salt: {}", e)))?;
    let nonce_bytes = STANDARD
        .decode(file.nonce.as_bytes())
        .map_err(|e| Error::Encryption(format!("failed to decode nonce: {}", e)))?;
    if nonce_bytes.len() != NONCE_LENGTH {
        return Err(Error::Encryption("invalid nonce length".to_string()));
    }
    let ciphertext = STANDARD
        .decode(file.data.as_bytes())
        .map_err(|e| Error::Encryption(format!("failed to decode ciphertext: {}", e)))?;

    let key = derive_key(master_key, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| Error::Encryption(format!("invalid key material: {}", e)))?;

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| {
                Error::Encryption("wrong master key or corrupted data".to_string())
            })?,
    );

    Ok(serde_json::from_slice(&plaintext)?)
}
