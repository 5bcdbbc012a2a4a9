// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Secret providers: resolvers for a single reference scheme.
//!
//! A provider sits in front of zero or more backends. The registry routes a
//! parsed reference to the provider owning its scheme; providers never see
//! raw reference strings, only the key part.

pub mod env;
pub mod file;
pub mod keychain;
pub mod plain;

pub use env::EnvProvider;
pub use file::FileProvider;
pub use keychain::KeychainProvider;
pub use plain::PlainProvider;

use crate::context::ResolveContext;
use crate::error::Result;
use async_trait::async_trait;

/// Resolver for one URI scheme.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// The scheme this provider owns, e.g. `env` or `keychain`.
    fn scheme(&self) -> &str;

    /// Resolve the key part of a reference to its secret value.
    async fn resolve(&self, ctx: &ResolveContext, key: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn _assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_provider_is_object_safe_send_sync() {
        _assert_send_sync::<Box<dyn SecretProvider>>();
        _assert_send_sync::<Arc<dyn SecretProvider>>();
    }
}
