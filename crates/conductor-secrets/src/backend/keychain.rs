// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Backend over the OS credential vault (macOS Keychain, Linux Secret
//! Service, Windows Credential Manager) via the `keyring` crate.
//!
//! Availability is probed once at construction by reading a sentinel entry:
//! a clean `NoEntry` means the vault answers, anything else means the vault
//! is absent or refusing us (no daemon, locked session, missing D-Bus).

use crate::backend::{SecretBackend, KEYCHAIN_PRIORITY};
use crate::context::ResolveContext;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Service identifier all conductor entries are stored under.
pub const KEYCHAIN_SERVICE: &str = "conductor";

const AVAILABILITY_SENTINEL: &str = "conductor-availability-probe";

/// Backend storing secrets in the platform credential vault.
pub struct KeychainBackend {
    service: String,
    available: bool,
}

impl KeychainBackend {
    /// Construct and probe the default `conductor` service.
    pub fn new() -> Self {
        Self::with_service(KEYCHAIN_SERVICE)
    }

    /// Construct against a custom service identifier (used by tests).
    pub fn with_service(service: &str) -> Self {
        let available = probe(service);
        if !available {
            tracing::debug!(service, "OS keychain unavailable");
        }
        Self {
            service: service.to_string(),
            available,
        }
    }

    fn require_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::Unavailable("keychain".to_string()))
        }
    }
}

impl Default for KeychainBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn probe(service: &str) -> bool {
    let entry = match keyring::Entry::new(service, AVAILABILITY_SENTINEL) {
        Ok(entry) => entry,
        Err(_) => return false,
    };
    match entry.get_password() {
        Ok(_) => true,
        Err(keyring::Error::NoEntry) => true,
        Err(_) => false,
    }
}

/// Map a vault error onto the taxonomy.
///
/// `NoEntry` is structured; everything else is an opaque platform string, so
/// the lock/permission/dbus/cancel states are recognised by substring.
fn map_keychain_error(key: &str, err: keyring::Error) -> Error {
    if matches!(err, keyring::Error::NoEntry) {
        return Error::NotFound(key.to_string());
    }
    let text = err.to_string().to_lowercase();
    if text.contains("locked")
        || text.contains("permission denied")
        || text.contains("dbus")
        || text.contains("canceled")
    {
        Error::AccessDenied(format!("keychain refused access for {key}"))
    } else {
        Error::NotFound(key.to_string())
    }
}

#[async_trait]
impl SecretBackend for KeychainBackend {
    fn name(&self) -> &str {
        "keychain"
    }

    fn priority(&self) -> i32 {
        KEYCHAIN_PRIORITY
    }

    fn available(&self) -> bool {
        self.available
    }

    async fn get(&self, ctx: &ResolveContext, key: &str) -> Result<String> {
        self.require_available()?;
        let service = self.service.clone();
        let key = key.to_string();
        ctx.run_blocking("keychain get", move || {
            let entry = keyring::Entry::new(&service, &key)
                .map_err(|e| map_keychain_error(&key, e))?;
            entry
                .get_password()
                .map_err(|e| map_keychain_error(&key, e))
        })
        .await
    }

    async fn set(&self, ctx: &ResolveContext, key: &str, value: &str) -> Result<()> {
        self.require_available()?;
        let service = self.service.clone();
        let key = key.to_string();
        let value = value.to_string();
        ctx.run_blocking("keychain set", move || {
            let entry = keyring::Entry::new(&service, &key)
                .map_err(|e| map_keychain_error(&key, e))?;
            entry
                .set_password(&value)
                .map_err(|e| map_keychain_error(&key, e))
        })
        .await
    }

    async fn delete(&self, ctx: &ResolveContext, key: &str) -> Result<()> {
        self.require_available()?;
        let service = self.service.clone();
        let key = key.to_string();
        ctx.run_blocking("keychain delete", move || {
            let entry = keyring::Entry::new(&service, &key)
                .map_err(|e| map_keychain_error(&key, e))?;
            entry
                .delete_credential()
                .map_err(|e| map_keychain_error(&key, e))
        })
        .await
    }

    /// The platform APIs do not expose enumeration; the listing is empty.
    async fn list(&self, _ctx: &ResolveContext) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
