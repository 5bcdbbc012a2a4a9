// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-run resolution cache.
//!
//! Memoises successful resolutions for the lifetime of one workflow run.
//! Errors are never cached. The cache lock is only held for map mutation,
//! never across a provider call, so a slow provider cannot block unrelated
//! cache reads.
//!
//! Clearing overwrites the stored values before dropping them. The runtime
//! may still hold copies elsewhere; this narrows the exposure window, it does
//! not guarantee a full memory wipe.

use crate::context::ResolveContext;
use crate::error::ResolveError;
use crate::reference::SecretRef;
use crate::registry::ProviderRegistry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use zeroize::Zeroize;

/// One memoised resolution.
#[derive(Clone)]
pub struct CacheEntry {
    pub value: String,
    pub resolved_at: DateTime<Utc>,
    pub provider_scheme: String,
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("value", &"[REDACTED]")
            .field("resolved_at", &self.resolved_at)
            .field("provider_scheme", &self.provider_scheme)
            .finish()
    }
}

/// Snapshot of cache occupancy for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub run_count: usize,
    pub secret_count: usize,
    pub per_run: HashMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Thread-safe, run-scoped resolution cache over a [`ProviderRegistry`].
pub struct RunCache {
    registry: Arc<ProviderRegistry>,
    runs: RwLock<HashMap<String, HashMap<String, CacheEntry>>>,
}

impl RunCache {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a reference for a run, memoising the result.
    ///
    /// Concurrent callers racing on the same `(run, reference)` may each hit
    /// the provider; later stores simply overwrite. Sequential callers see
    /// the provider invoked at most once per distinct pair.
    pub async fn resolve(
        &self,
        ctx: &ResolveContext,
        run_id: &str,
        reference: &str,
    ) -> Result<String, ResolveError> {
        {
            let runs = self.runs.read().await;
            if let Some(entry) = runs.get(run_id).and_then(|run| run.get(reference)) {
                return Ok(entry.value.clone());
            }
        }

        let value = self.registry.resolve(ctx, reference).await?;

        let entry = CacheEntry {
            value: value.clone(),
            resolved_at: Utc::now(),
            provider_scheme: SecretRef::parse(reference).provider_scheme().to_string(),
        };
        let mut runs = self.runs.write().await;
        runs.entry(run_id.to_string())
            .or_default()
            .insert(reference.to_string(), entry);
        Ok(value)
    }

    /// Drop one run's entries, overwriting each value first.
    pub async fn clear(&self, run_id: &str) {
        let mut runs = self.runs.write().await;
        if let Some(mut run) = runs.remove(run_id) {
            for entry in run.values_mut() {
                entry.value.zeroize();
            }
        }
    }

    /// Drop every run's entries, overwriting values first.
    pub async fn clear_all(&self) {
        let mut runs = self.runs.write().await;
        for (_, run) in runs.iter_mut() {
            for entry in run.values_mut() {
                entry.value.zeroize();
            }
        }
        runs.clear();
    }

    /// Occupancy snapshot.
    pub async fn stats(&self) -> CacheStats {
        let runs = self.runs.read().await;
        let mut per_run = HashMap::new();
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;
        let mut secret_count = 0;
        for (run_id, run) in runs.iter() {
            per_run.insert(run_id.clone(), run.len());
            secret_count += run.len();
            for entry in run.values() {
                if oldest.map_or(true, |t| entry.resolved_at < t) {
                    oldest = Some(entry.resolved_at);
                }
                if newest.map_or(true, |t| entry.resolved_at > t) {
                    newest = Some(entry.resolved_at);
                }
            }
        }
        CacheStats {
            run_count: runs.len(),
            secret_count,
            per_run,
            oldest,
            newest,
        }
    }
}
