// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Reusable fixtures for exercising the secret subsystem against a
//! throwaway config directory.

use conductor_secrets::backend::EncryptedFileBackend;
use conductor_secrets::SecretsConfig;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

/// A temporary config directory with a [`SecretsConfig`] pointed at it.
///
/// Dropping the fixture removes the directory and everything in it.
pub struct ConfigFixture {
    pub config: SecretsConfig,
    _dir: TempDir,
}

impl ConfigFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp config dir");
        let config = SecretsConfig {
            config_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        Self { config, _dir: dir }
    }

    /// The fixture's config directory.
    pub fn dir(&self) -> &Path {
        self.config.config_dir.as_deref().expect("fixture dir")
    }

    /// An encrypted file backend in this directory with an explicit key.
    pub fn file_backend(&self, master_key: &str) -> EncryptedFileBackend {
        EncryptedFileBackend::new(&self.config, Some(master_key))
            .expect("construct file backend")
    }
}

impl Default for ConfigFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a binding map from literal pairs.
pub fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Scoped environment variable: set on construction, removed on drop.
///
/// Keeps env-var tests from leaking state into each other; use distinct
/// variable names per test, the guard does not attempt cross-test locking.
pub struct EnvVarGuard {
    name: String,
}

impl EnvVarGuard {
    pub fn set(name: &str, value: &str) -> Self {
        std::env::set_var(name, value);
        Self {
            name: name.to_string(),
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        std::env::remove_var(&self.name);
    }
}
