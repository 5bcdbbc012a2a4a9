// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Provider for `env:NAME` references, gated by a per-profile access policy.

use crate::config::EnvAccessPolicy;
use crate::context::ResolveContext;
use crate::error::{Error, Result};
use crate::provider::SecretProvider;
use async_trait::async_trait;

/// Resolves environment variables under the profile's [`EnvAccessPolicy`].
#[derive(Debug, Default)]
pub struct EnvProvider {
    policy: EnvAccessPolicy,
}

impl EnvProvider {
    pub fn new(policy: EnvAccessPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl SecretProvider for EnvProvider {
    fn scheme(&self) -> &str {
        "env"
    }

    async fn resolve(&self, _ctx: &ResolveContext, key: &str) -> Result<String> {
        if !self.policy.enabled {
            return Err(Error::AccessDenied(
                "environment access is disabled for this profile".to_string(),
            ));
        }
        if !self.policy.allows(key) {
            return Err(Error::AccessDenied(format!(
                "environment variable {key} is not in the profile allowlist"
            )));
        }
        match std::env::var(key) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(Error::NotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_resolves_allowed_variable() {
        std::env::set_var("ENVPROV_TEST_TOKEN", "tok-1");
        let provider = EnvProvider::new(EnvAccessPolicy {
            enabled: true,
            allowlist: vec!["ENVPROV_*".into()],
        });
        let ctx = ResolveContext::new();
        assert_eq!(
            provider.resolve(&ctx, "ENVPROV_TEST_TOKEN").await.unwrap(),
            "tok-1"
        );
        std::env::remove_var("ENVPROV_TEST_TOKEN");
    }

    #[tokio::test]
    async fn test_disabled_policy_denies_everything() {
        std::env::set_var("ENVPROV_DISABLED_TOKEN", "tok-1");
        let provider = EnvProvider::new(EnvAccessPolicy {
            enabled: false,
            allowlist: Vec::new(),
        });
        let ctx = ResolveContext::new();
        let err = provider
            .resolve(&ctx, "ENVPROV_DISABLED_TOKEN")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        std::env::remove_var("ENVPROV_DISABLED_TOKEN");
    }

    #[tokio::test]
    async fn test_allowlist_miss_is_denied() {
        let provider = EnvProvider::new(EnvAccessPolicy {
            enabled: true,
            allowlist: vec!["ALLOWED_ONLY".into()],
        });
        let ctx = ResolveContext::new();
        let err = provider.resolve(&ctx, "SOMETHING_ELSE").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_empty_value_is_not_found() {
        std::env::set_var("ENVPROV_EMPTY_TOKEN", "");
        let provider = EnvProvider::new(EnvAccessPolicy::default());
        let ctx = ResolveContext::new();
        let err = provider.resolve(&ctx, "ENVPROV_EMPTY_TOKEN").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        std::env::remove_var("ENVPROV_EMPTY_TOKEN");
    }
}
