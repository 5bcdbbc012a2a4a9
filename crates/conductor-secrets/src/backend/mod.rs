// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Storage backends: concrete credential stores behind one capability trait.

pub mod env;
pub mod file;
pub mod keychain;

pub use env::EnvBackend;
pub use file::EncryptedFileBackend;
pub use keychain::KeychainBackend;

use crate::context::ResolveContext;
use crate::error::Result;
use async_trait::async_trait;

/// Priority of the environment backend.
pub const ENV_PRIORITY: i32 = 100;
/// Priority of the OS keychain backend.
pub const KEYCHAIN_PRIORITY: i32 = 50;
/// Priority of the encrypted file backend.
pub const FILE_PRIORITY: i32 = 25;

/// Common capability contract over the concrete credential stores.
///
/// Backends own their credentials (including any OS handles). The resolver
/// consults them through shared references only; callers never close a
/// backend mid-operation.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Stable backend name (`env`, `keychain`, `file`).
    fn name(&self) -> &str;

    /// Resolution priority; higher wins. Unique per registered backend.
    fn priority(&self) -> i32;

    /// Whether the backend can currently serve requests.
    fn available(&self) -> bool;

    /// Whether writes are rejected.
    fn read_only(&self) -> bool {
        false
    }

    /// Fetch a secret value.
    async fn get(&self, ctx: &ResolveContext, key: &str) -> Result<String>;

    /// Store a secret value.
    async fn set(&self, ctx: &ResolveContext, key: &str, value: &str) -> Result<()>;

    /// Remove a secret.
    async fn delete(&self, ctx: &ResolveContext, key: &str) -> Result<()>;

    /// Enumerate stored keys. May be empty when the underlying store does
    /// not support enumeration.
    async fn list(&self, ctx: &ResolveContext) -> Result<Vec<String>>;
}
