// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Scheme-routed provider registry.
//!
//! The provider map is built once and read-only afterwards, so resolution
//! takes no lock. Every error leaving [`ProviderRegistry::resolve`] is
//! wrapped in the sanitising [`ResolveError`] envelope; a raw provider error
//! must never cross this boundary.

use crate::backend::KeychainBackend;
use crate::config::SecretsConfig;
use crate::context::ResolveContext;
use crate::error::{Error, ErrorKind, ResolveError, Result};
use crate::provider::{EnvProvider, FileProvider, KeychainProvider, PlainProvider, SecretProvider};
use crate::reference::SecretRef;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes references to providers by scheme.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SecretProvider>>,
}

impl ProviderRegistry {
    /// Empty registry with only the built-in `plain` provider.
    pub fn new() -> Self {
        let mut providers: HashMap<String, Arc<dyn SecretProvider>> = HashMap::new();
        providers.insert("plain".to_string(), Arc::new(PlainProvider));
        Self { providers }
    }

    /// Registry with the standard providers wired from configuration.
    pub fn with_defaults(config: &SecretsConfig, keychain: Arc<KeychainBackend>) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(EnvProvider::new(config.env_policy.clone())))?;
        registry.register(Arc::new(FileProvider::new(config.file_policy.clone())))?;
        registry.register(Arc::new(KeychainProvider::new(keychain)))?;
        Ok(registry)
    }

    /// Register a provider. A second provider for the same scheme is a
    /// configuration error.
    pub fn register(&mut self, provider: Arc<dyn SecretProvider>) -> Result<()> {
        let scheme = provider.scheme().to_string();
        if self.providers.contains_key(&scheme) {
            return Err(Error::Validation(format!(
                "provider already registered for scheme: {scheme}"
            )));
        }
        self.providers.insert(scheme, provider);
        Ok(())
    }

    /// The schemes currently registered.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        schemes.sort();
        schemes
    }

    /// Resolve a reference string to its secret value.
    ///
    /// `${NAME}` is a synonym for `env:NAME`; a bare literal resolves through
    /// the built-in `plain` provider unchanged.
    pub async fn resolve(
        &self,
        ctx: &ResolveContext,
        reference: &str,
    ) -> std::result::Result<String, ResolveError> {
        let parsed = SecretRef::parse(reference);
        let scheme = parsed.provider_scheme().to_string();
        let key = parsed.provider_key();

        let provider = self.providers.get(&scheme).ok_or_else(|| {
            ResolveError::with_kind(
                reference,
                &scheme,
                ErrorKind::NotFound,
                Error::NotFound(format!("no provider registered for scheme: {scheme}")),
            )
        })?;

        let outcome = ctx
            .bound("provider resolve", provider.resolve(ctx, key))
            .await;
        match outcome {
            Ok(value) => Ok(value),
            Err(cause) => {
                let wrapped = ResolveError::wrap(reference, &scheme, cause);
                tracing::debug!(
                    reference = %wrapped.reference(),
                    provider = %wrapped.provider(),
                    kind = %wrapped.kind(),
                    cause = %wrapped.audit_cause(),
                    "secret resolution failed"
                );
                Err(wrapped)
            }
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
