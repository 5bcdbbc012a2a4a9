// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mock providers and backends for driving the registry, resolver, and
//! cache without touching real stores.

use async_trait::async_trait;
use conductor_secrets::backend::SecretBackend;
use conductor_secrets::{Error, ResolveContext, Result, SecretProvider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Provider that counts invocations and echoes its key.
pub struct CountingProvider {
    scheme: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CountingProvider {
    pub fn new(scheme: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                scheme,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl SecretProvider for CountingProvider {
    fn scheme(&self) -> &str {
        self.scheme
    }

    async fn resolve(&self, _ctx: &ResolveContext, key: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("resolved:{key}"))
    }
}

/// Provider that serves a fixed map and reports misses as NotFound.
pub struct StaticProvider {
    scheme: &'static str,
    values: HashMap<String, String>,
}

impl StaticProvider {
    pub fn new(scheme: &'static str, pairs: &[(&str, &str)]) -> Self {
        Self {
            scheme,
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl SecretProvider for StaticProvider {
    fn scheme(&self) -> &str {
        self.scheme
    }

    async fn resolve(&self, _ctx: &ResolveContext, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

/// Provider that always fails with the supplied error.
pub struct FailingProvider {
    scheme: &'static str,
    error: fn() -> Error,
}

impl FailingProvider {
    pub fn new(scheme: &'static str, error: fn() -> Error) -> Self {
        Self { scheme, error }
    }
}

#[async_trait]
impl SecretProvider for FailingProvider {
    fn scheme(&self) -> &str {
        self.scheme
    }

    async fn resolve(&self, _ctx: &ResolveContext, _key: &str) -> Result<String> {
        Err((self.error)())
    }
}

/// In-memory backend with configurable name, priority, and writability.
pub struct MemoryBackend {
    name: String,
    priority: i32,
    read_only: bool,
    values: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            read_only: false,
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn available(&self) -> bool {
        true
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn get(&self, _ctx: &ResolveContext, key: &str) -> Result<String> {
        self.values
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn set(&self, _ctx: &ResolveContext, key: &str, value: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, _ctx: &ResolveContext, key: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnly(self.name.clone()));
        }
        self.values
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn list(&self, _ctx: &ResolveContext) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.values.lock().unwrap().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
