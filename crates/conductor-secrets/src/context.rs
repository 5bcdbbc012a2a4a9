// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Deadline propagation for backend and provider calls.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

/// Carries the wall-clock budget of one resolution.
///
/// Providers may block on filesystem IO or OS-keychain IPC; every such call
/// goes through [`ResolveContext::bound`] or [`ResolveContext::run_blocking`]
/// so an expired context yields a Timeout-category error promptly instead of
/// hanging the caller.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext {
    deadline: Instant,
}

impl ResolveContext {
    /// Default per-provider budget when the caller sets no tighter deadline.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Context with the default budget.
    pub fn new() -> Self {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Context expiring after the given duration.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    /// Time left before the deadline; zero when expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed.
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Run an async operation under the remaining budget.
    pub async fn bound<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.expired() {
            return Err(Error::Timeout(format!("{what}: deadline exceeded")));
        }
        match tokio::time::timeout(self.remaining(), fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!("{what}: deadline exceeded"))),
        }
    }

    /// Run a blocking operation (CPU-bound derivation, keychain IPC) on the
    /// blocking pool, bounded by the remaining budget. The worker itself is
    /// not interruptible; the caller just stops waiting for it.
    pub async fn run_blocking<T, F>(&self, what: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if self.expired() {
            return Err(Error::Timeout(format!("{what}: deadline exceeded")));
        }
        let handle = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.remaining(), handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Validation(format!(
                "{what}: worker failed: {join_err}"
            ))),
            Err(_) => Err(Error::Timeout(format!("{what}: deadline exceeded"))),
        }
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new()
    }
}
