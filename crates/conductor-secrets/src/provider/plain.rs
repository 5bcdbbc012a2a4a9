// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Built-in provider for bare literals.

use crate::context::ResolveContext;
use crate::error::Result;
use crate::provider::SecretProvider;
use async_trait::async_trait;

/// Returns non-reference strings unchanged, so callers can treat every
/// binding value as resolvable.
#[derive(Debug, Default)]
pub struct PlainProvider;

#[async_trait]
impl SecretProvider for PlainProvider {
    fn scheme(&self) -> &str {
        "plain"
    }

    async fn resolve(&self, _ctx: &ResolveContext, key: &str) -> Result<String> {
        Ok(key.to_string())
    }
}
