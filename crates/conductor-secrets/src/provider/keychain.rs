// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Provider for `keychain:KEY` references, backed by the OS keychain backend.

use crate::backend::{KeychainBackend, SecretBackend};
use crate::context::ResolveContext;
use crate::error::Result;
use crate::provider::SecretProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves keychain references through the shared [`KeychainBackend`].
pub struct KeychainProvider {
    backend: Arc<KeychainBackend>,
}

impl KeychainProvider {
    pub fn new(backend: Arc<KeychainBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SecretProvider for KeychainProvider {
    fn scheme(&self) -> &str {
        "keychain"
    }

    async fn resolve(&self, ctx: &ResolveContext, key: &str) -> Result<String> {
        self.backend.get(ctx, key).await
    }
}
