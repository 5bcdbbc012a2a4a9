// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests for the encrypted secrets file format

use base64::{engine::general_purpose::STANDARD, Engine};
use conductor_secrets::crypto::{
    decrypt_secret_map, encrypt_secret_map, ARGON2_ITERATIONS, ARGON2_MEMORY_KIB,
    ARGON2_PARALLELISM, KEY_LENGTH, NONCE_LENGTH, SALT_LENGTH,
};
use std::collections::BTreeMap;

#[test]
fn test_round_trip_large_values() {
    let mut map = BTreeMap::new();
    // A megabyte-scale value round-trips unchanged.
    map.insert("blob".to_string(), "x".repeat(1024 * 1024));
    map.insert("unicode".to_string(), "pässwörd-秘密-🔑".to_string());
    map.insert("empty".to_string(), String::new());

    let content = encrypt_secret_map(&map, b"master-key").unwrap();
    let decrypted = decrypt_secret_map(&content, b"master-key").unwrap();
    assert_eq!(map, decrypted);
}

#[test]
fn test_envelope_is_well_formed_json() {
    let mut map = BTreeMap::new();
    map.insert("a/b".to_string(), "v".to_string());
    let content = encrypt_secret_map(&map, b"mk").unwrap();

    let envelope: serde_json::Value = serde_json::from_slice(&content).unwrap();
    let salt = STANDARD
        .decode(envelope["salt"].as_str().unwrap())
        .unwrap();
    let nonce = STANDARD
        .decode(envelope["nonce"].as_str().unwrap())
        .unwrap();
    assert_eq!(salt.len(), SALT_LENGTH);
    assert_eq!(nonce.len(), NONCE_LENGTH);
    assert!(!envelope["data"].as_str().unwrap().is_empty());
}

#[test]
fn test_every_tampered_data_byte_fails_closed() {
    let mut map = BTreeMap::new();
    map.insert("key".to_string(), "plaintext-value".to_string());
    let content = encrypt_secret_map(&map, b"mk").unwrap();

    let mut envelope: serde_json::Value = serde_json::from_slice(&content).unwrap();
    let mut data = STANDARD
        .decode(envelope["data"].as_str().unwrap())
        .unwrap();

    // Flip a byte at a few positions across the ciphertext, including the tag.
    for index in [0, data.len() / 2, data.len() - 1] {
        data[index] ^= 0xFF;
        envelope["data"] = serde_json::Value::String(STANDARD.encode(&data));
        let tampered = serde_json::to_vec(&envelope).unwrap();
        let err = decrypt_secret_map(&tampered, b"mk").unwrap_err();
        assert!(!err.to_string().contains("plaintext-value"));
        data[index] ^= 0xFF;
    }
}

#[test]
fn test_cost_parameters_are_the_published_constants() {
    assert_eq!(ARGON2_MEMORY_KIB, 65_536);
    assert_eq!(ARGON2_ITERATIONS, 3);
    assert_eq!(ARGON2_PARALLELISM, 4);
    assert_eq!(KEY_LENGTH, 32);
}

#[test]
fn test_garbage_input_fails_cleanly() {
    assert!(decrypt_secret_map(b"not json at all", b"mk").is_err());
    assert!(decrypt_secret_map(b"{}", b"mk").is_err());
    assert!(decrypt_secret_map(
        br#"{"salt":"AA==","nonce":"AA==","data":"AA=="}"#,
        b"mk"
    )
    .is_err());
}
