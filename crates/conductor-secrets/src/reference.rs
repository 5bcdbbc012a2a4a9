// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Secret keys and the reference grammar.
//!
//! A secret key is a hierarchical, `/`-delimited ASCII string such as
//! `providers/anthropic/api_key`. A reference is the string form of a lookup:
//! `scheme:key`, the legacy `${NAME}` (a synonym for `env:NAME`), or a plain
//! literal that is not a reference at all.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Prefix for environment-variable secret storage.
pub const ENV_KEY_PREFIX: &str = "CONDUCTOR_SECRET_";

fn scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*$").unwrap())
}

fn legacy_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\{([A-Z_][A-Z0-9_]*)\}$").unwrap())
}

/// A parsed secret reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    /// `scheme:key` with a registered scheme, e.g. `keychain:providers/x/api_key`.
    Scheme { scheme: String, key: String },
    /// Legacy `${NAME}` form, resolved as `env:NAME`.
    EnvLegacy { name: String },
    /// Not a reference; the literal value stands for itself.
    Plain { literal: String },
}

impl SecretRef {
    /// Parse a raw string. Total: every input maps to one of the variants.
    pub fn parse(raw: &str) -> SecretRef {
        if let Some(caps) = legacy_regex().captures(raw) {
            return SecretRef::EnvLegacy {
                name: caps[1].to_string(),
            };
        }
        if let Some((prefix, suffix)) = raw.split_once(':') {
            if scheme_regex().is_match(prefix) && !suffix.is_empty() {
                return SecretRef::Scheme {
                    scheme: prefix.to_string(),
                    key: suffix.to_string(),
                };
            }
        }
        SecretRef::Plain {
            literal: raw.to_string(),
        }
    }

    /// The scheme of the provider that handles this reference.
    pub fn provider_scheme(&self) -> &str {
        match self {
            SecretRef::Scheme { scheme, .. } => scheme,
            SecretRef::EnvLegacy { .. } => "env",
            SecretRef::Plain { .. } => "plain",
        }
    }

    /// The key handed to the provider.
    pub fn provider_key(&self) -> &str {
        match self {
            SecretRef::Scheme { key, .. } => key,
            SecretRef::EnvLegacy { name } => name,
            SecretRef::Plain { literal } => literal,
        }
    }
}

/// Validate a secret key: non-empty, no whitespace, no backslash, ASCII only.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidSyntax("secret key cannot be empty".into()));
    }
    if !key.is_ascii() {
        return Err(Error::InvalidSyntax(format!(
            "secret key must be ASCII: {}",
            truncate_reference(key)
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c == '\\') {
        return Err(Error::InvalidSyntax(format!(
            "secret key cannot contain whitespace or backslashes: {}",
            truncate_reference(key)
        )));
    }
    Ok(())
}

/// Normalise a key to its environment-variable form:
/// `providers/anthropic/api_key` becomes `CONDUCTOR_SECRET_PROVIDERS_ANTHROPIC_API_KEY`.
pub fn env_var_name(key: &str) -> String {
    let upper = key.to_ascii_uppercase().replace('/', "_");
    format!("{ENV_KEY_PREFIX}{upper}")
}

/// Well-known alias for provider API keys: `providers/<name>/api_key`
/// is also looked up as `<NAME>_API_KEY`.
pub fn provider_alias_var(key: &str) -> Option<String> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("providers"), Some(name), Some("api_key"), None) if !name.is_empty() => {
            Some(format!("{}_API_KEY", name.to_ascii_uppercase()))
        }
        _ => None,
    }
}

/// Recover a secret key from its environment-variable form.
///
/// The mapping is deliberately lossy: only the first two underscores after
/// the prefix become slashes, the rest stay underscores. So
/// `CONDUCTOR_SECRET_PROVIDERS_OPENAI_API_KEY` yields
/// `providers/openai/api_key`, and a key that originally contained
/// underscores in its first two segments cannot round-trip. `list` on the
/// env backend uses this same mapping so it stays consistent with `get`.
pub fn key_from_env_var(var: &str) -> Option<String> {
    let rest = var.strip_prefix(ENV_KEY_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    let lower = rest.to_ascii_lowercase();
    let mut segments = lower.splitn(3, '_');
    let first = segments.next()?;
    match (segments.next(), segments.next()) {
        (Some(second), Some(tail)) => Some(format!("{first}/{second}/{tail}")),
        (Some(second), None) => Some(format!("{first}/{second}")),
        (None, _) => Some(first.to_string()),
    }
}

/// Truncate a reference for display: `first4 + "***" + last4` for strings of
/// at least nine characters, `"***"` otherwise.
pub fn truncate_reference(reference: &str) -> String {
    let chars: Vec<char> = reference.chars().collect();
    if chars.len() < 9 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

/// Mask a secret value for display: `first4…last4`, or an opaque mask for
/// short values.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 9 {
        return "••••".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
