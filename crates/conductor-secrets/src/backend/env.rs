// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Read-only backend over the process environment.

use crate::backend::{SecretBackend, ENV_PRIORITY};
use crate::context::ResolveContext;
use crate::error::{Error, Result};
use crate::reference::{env_var_name, key_from_env_var, provider_alias_var, ENV_KEY_PREFIX};
use async_trait::async_trait;

/// Backend that reads secrets from `CONDUCTOR_SECRET_*` environment
/// variables. Always available; writes are rejected.
#[derive(Debug, Default)]
pub struct EnvBackend;

impl EnvBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecretBackend for EnvBackend {
    fn name(&self) -> &str {
        "env"
    }

    fn priority(&self) -> i32 {
        ENV_PRIORITY
    }

    fn available(&self) -> bool {
        true
    }

    fn read_only(&self) -> bool {
        true
    }

    async fn get(&self, _ctx: &ResolveContext, key: &str) -> Result<String> {
        // The normalised form wins over the provider alias when both are set.
        let normalised = env_var_name(key);
        if let Ok(value) = std::env::var(&normalised) {
            if !value.is_empty() {
                return Ok(value);
            }
        }
        if let Some(alias) = provider_alias_var(key) {
            if let Ok(value) = std::env::var(&alias) {
                if !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        Err(Error::NotFound(key.to_string()))
    }

    async fn set(&self, _ctx: &ResolveContext, _key: &str, _value: &str) -> Result<()> {
        Err(Error::ReadOnly("env".to_string()))
    }

    async fn delete(&self, _ctx: &ResolveContext, _key: &str) -> Result<()> {
        Err(Error::ReadOnly("env".to_string()))
    }

    async fn list(&self, _ctx: &ResolveContext) -> Result<Vec<String>> {
        let mut keys: Vec<String> = std::env::vars()
            .filter(|(name, value)| name.starts_with(ENV_KEY_PREFIX) && !value.is_empty())
            .filter_map(|(name, _)| key_from_env_var(&name))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
