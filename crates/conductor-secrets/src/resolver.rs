// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Priority-chained resolver over the storage backends.
//!
//! This is the administrative surface used by the CLI (list/set/delete),
//! distinct from runtime reference resolution. Backends are consulted in
//! strictly descending priority; unavailable backends are dropped at
//! construction time.

use crate::backend::SecretBackend;
use crate::context::ResolveContext;
use crate::error::{Error, ErrorKind, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One key in the union listing, attributed to the backend that wins it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretListEntry {
    pub key: String,
    pub backend: String,
    pub read_only: bool,
}

/// Chains backends by priority with fall-through semantics.
pub struct BackendResolver {
    backends: Vec<Arc<dyn SecretBackend>>,
}

impl BackendResolver {
    /// Build the chain: sort descending by priority, filter unavailable.
    pub fn new(backends: Vec<Arc<dyn SecretBackend>>) -> Self {
        let mut backends: Vec<_> = backends.into_iter().filter(|b| b.available()).collect();
        backends.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        Self { backends }
    }

    /// The chained backends, highest priority first.
    pub fn backends(&self) -> &[Arc<dyn SecretBackend>] {
        &self.backends
    }

    fn backend_by_name(&self, name: &str) -> Result<&Arc<dyn SecretBackend>> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| Error::Validation(format!("unknown or unavailable backend: {name}")))
    }

    /// Fetch from the highest-priority backend holding the key.
    ///
    /// Non-NOT_FOUND failures never shadow a lower-priority hit; the first
    /// such failure is only returned when every backend misses.
    pub async fn get(&self, ctx: &ResolveContext, key: &str) -> Result<String> {
        let mut first_failure: Option<Error> = None;
        for backend in &self.backends {
            match backend.get(ctx, key).await {
                Ok(value) => return Ok(value),
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    tracing::debug!(backend = backend.name(), %err, "backend error during get");
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }
        Err(first_failure.unwrap_or_else(|| Error::NotFound(key.to_string())))
    }

    /// Store into the named backend, or the first writable one.
    /// Returns the name of the backend that accepted the write.
    pub async fn set(
        &self,
        ctx: &ResolveContext,
        key: &str,
        value: &str,
        target: Option<&str>,
    ) -> Result<String> {
        if let Some(name) = target {
            let backend = self.backend_by_name(name)?;
            backend.set(ctx, key, value).await?;
            return Ok(backend.name().to_string());
        }

        for backend in &self.backends {
            if backend.read_only() {
                continue;
            }
            match backend.set(ctx, key, value).await {
                Ok(()) => return Ok(backend.name().to_string()),
                Err(Error::ReadOnly(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::Unavailable(
            "no writable backend accepts secrets".to_string(),
        ))
    }

    /// Delete from the named backend, or from every writable backend.
    /// Succeeds when at least one backend actually held the key.
    pub async fn delete(&self, ctx: &ResolveContext, key: &str, target: Option<&str>) -> Result<()> {
        if let Some(name) = target {
            return self.backend_by_name(name)?.delete(ctx, key).await;
        }

        let mut deleted = false;
        for backend in &self.backends {
            if backend.read_only() {
                continue;
            }
            match backend.delete(ctx, key).await {
                Ok(()) => deleted = true,
                Err(Error::NotFound(_)) | Err(Error::ReadOnly(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        if deleted {
            Ok(())
        } else {
            Err(Error::NotFound(key.to_string()))
        }
    }

    /// Union of all backend listings. When the same key appears in several
    /// backends, the highest-priority one keeps the attribution tag.
    pub async fn list(&self, ctx: &ResolveContext) -> Result<Vec<SecretListEntry>> {
        let mut entries: BTreeMap<String, SecretListEntry> = BTreeMap::new();
        for backend in &self.backends {
            let keys = match backend.list(ctx).await {
                Ok(keys) => keys,
                Err(err) => {
                    tracing::warn!(backend = backend.name(), %err, "backend listing failed");
                    continue;
                }
            };
            for key in keys {
                entries.entry(key.clone()).or_insert_with(|| SecretListEntry {
                    key,
                    backend: backend.name().to_string(),
                    read_only: backend.read_only(),
                });
            }
        }
        Ok(entries.into_values().collect())
    }
}
