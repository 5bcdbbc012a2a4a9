// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Binding maps: the slice of configuration that carries secret references.
//!
//! A profile maps binding names to reference strings. At load time the map
//! is validated (grammar + cycle detection); at run time each value is
//! substituted through the per-run cache. Serialised configuration carries
//! reference strings only, never resolved values.

use crate::cache::RunCache;
use crate::context::ResolveContext;
use crate::error::{Error, ResolveError, Result};
use crate::reference::SecretRef;
use crate::validation::{detect_circular_references, validate_secret_reference};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn embedded_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap())
}

/// Validate a binding map at profile load time.
///
/// Whole-value references must satisfy the static grammar; the dependency
/// graph must be acyclic and within depth. Plain literals and embedded
/// `${NAME}` occurrences are left for runtime.
pub fn validate_bindings(bindings: &HashMap<String, String>) -> Result<()> {
    for (name, value) in bindings {
        if value.is_empty() {
            return Err(Error::Validation(format!(
                "binding {name} has an empty value"
            )));
        }
        if matches!(SecretRef::parse(value), SecretRef::Scheme { .. }) {
            validate_secret_reference(value)?;
        }
    }
    detect_circular_references(bindings)
}

/// Substitute one binding value through the cache.
///
/// Whole-value references resolve wholesale; embedded `${NAME}` occurrences
/// expand through the `env` scheme; anything else passes through untouched.
pub async fn substitute_value(
    cache: &RunCache,
    ctx: &ResolveContext,
    run_id: &str,
    value: &str,
) -> std::result::Result<String, ResolveError> {
    match SecretRef::parse(value) {
        SecretRef::Scheme { .. } | SecretRef::EnvLegacy { .. } => {
            return cache.resolve(ctx, run_id, value).await;
        }
        SecretRef::Plain { .. } => {}
    }

    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for caps in embedded_ref_regex().captures_iter(value) {
        let whole = caps.get(0).unwrap();
        out.push_str(&value[last..whole.start()]);
        let resolved = cache
            .resolve(ctx, run_id, &format!("env:{}", &caps[1]))
            .await?;
        out.push_str(&resolved);
        last = whole.end();
    }
    out.push_str(&value[last..]);
    Ok(out)
}

/// Substitute a whole binding map for one run.
pub async fn substitute_bindings(
    cache: &RunCache,
    ctx: &ResolveContext,
    run_id: &str,
    bindings: &HashMap<String, String>,
) -> std::result::Result<HashMap<String, String>, ResolveError> {
    let mut resolved = HashMap::with_capacity(bindings.len());
    for (name, value) in bindings {
        let substituted = substitute_value(cache, ctx, run_id, value).await?;
        resolved.insert(name.clone(), substituted);
    }
    Ok(resolved)
}

/// The reference string to embed in configuration for a secret stored in the
/// named backend, or `None` when the backend has no runtime scheme (the
/// encrypted file store is administrative only).
pub fn reference_for_backend(backend: &str, key: &str) -> Option<String> {
    match backend {
        "env" => Some(format!("env:{}", crate::reference::env_var_name(key))),
        "keychain" => Some(format!("keychain:{key}")),
        _ => None,
    }
}

/// Confirm a binding map carries no resolved secret material.
///
/// Used after rewriting configuration: every value must either be a
/// reference or avoid the given plaintext values entirely.
pub fn assert_no_plaintext(
    bindings: &HashMap<String, String>,
    plaintext_values: &[&str],
) -> Result<()> {
    for (name, value) in bindings {
        for plain in plaintext_values {
            if !plain.is_empty() && value.contains(plain) {
                return Err(Error::Validation(format!(
                    "binding {name} still embeds a plaintext secret"
                )));
            }
        }
    }
    Ok(())
}
