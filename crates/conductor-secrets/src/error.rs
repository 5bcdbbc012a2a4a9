// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the secret management subsystem

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for secret operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during secret storage and resolution
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("backend is read-only: {0}")]
    ReadOnly(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("invalid secret reference: {0}")]
    InvalidSyntax(String),

    #[error("circular secret reference: {}", chain.join(" -> "))]
    CircularReference { chain: Vec<String> },

    #[error("secret reference depth exceeded: {}", chain.join(" -> "))]
    DepthExceeded { chain: Vec<String> },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("could not acquire lock on {0} within {1:?}")]
    LockTimeout(PathBuf, Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

/// The externally visible category of a resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidSyntax,
    NotFound,
    AccessDenied,
    Timeout,
    CircularRef,
    Validation,
}

impl ErrorKind {
    /// Stable machine-facing tag for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSyntax => "INVALID_SYNTAX",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AccessDenied => "ACCESS_DENIED",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::CircularRef => "CIRCULAR_REF",
            ErrorKind::Validation => "VALIDATION",
        }
    }

    /// A short, user-actionable hint for interactive tools.
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            ErrorKind::InvalidSyntax => "check the reference syntax (scheme:key)",
            ErrorKind::NotFound => "store the secret first: conductor secrets set <key>",
            ErrorKind::AccessDenied => "check allowlist and permissions",
            ErrorKind::Timeout => "retry, or raise the resolution deadline",
            ErrorKind::CircularRef => "break the reference cycle between bindings",
            ErrorKind::Validation => "fix the profile configuration and reload",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Map a structured error onto the external taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::Unavailable(_) => ErrorKind::NotFound,
            Error::AccessDenied(_) | Error::ReadOnly(_) | Error::PermissionDenied(_) => {
                ErrorKind::AccessDenied
            }
            Error::Timeout(_) | Error::LockTimeout(..) => ErrorKind::Timeout,
            Error::InvalidSyntax(_) => ErrorKind::InvalidSyntax,
            Error::CircularReference { .. } | Error::DepthExceeded { .. } => ErrorKind::CircularRef,
            Error::Validation(_) | Error::Config(_) | Error::Encryption(_) => ErrorKind::Validation,
            // Mechanical errors carry no category of their own; infer one
            // from the message the way provider errors are categorised.
            Error::Io(e) => categorize_message(&e.to_string()),
            Error::Json(e) => categorize_message(&e.to_string()),
            Error::Yaml(e) => categorize_message(&e.to_string()),
        }
    }
}

/// Infer a category from an unstructured error message.
pub fn categorize_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("not found") {
        ErrorKind::NotFound
    } else if lower.contains("permission") || lower.contains("access") {
        ErrorKind::AccessDenied
    } else if lower.contains("timeout") || lower.contains("deadline") {
        ErrorKind::Timeout
    } else if lower.contains("invalid") || lower.contains("malformed") {
        ErrorKind::InvalidSyntax
    } else {
        ErrorKind::NotFound
    }
}

/// Sanitised error returned for every failed resolution that crosses the
/// registry boundary.
///
/// The user-facing surface (`Display` and `Debug`) reveals only the truncated
/// reference, the provider scheme, and the category. The full cause stays in
/// a private field, reachable through [`ResolveError::audit_cause`] for
/// structured audit logging only.
pub struct ResolveError {
    reference: String,
    provider: String,
    kind: ErrorKind,
    cause: Box<Error>,
}

impl ResolveError {
    /// Wrap a provider or backend error, truncating the reference.
    pub fn wrap(reference: &str, provider: &str, cause: Error) -> Self {
        Self {
            reference: crate::reference::truncate_reference(reference),
            provider: provider.to_string(),
            kind: cause.kind(),
            cause: Box::new(cause),
        }
    }

    /// Wrap with an explicit category, overriding the cause's own.
    pub fn with_kind(reference: &str, provider: &str, kind: ErrorKind, cause: Error) -> Self {
        Self {
            reference: crate::reference::truncate_reference(reference),
            provider: provider.to_string(),
            kind,
            cause: Box::new(cause),
        }
    }

    /// The truncated reference this failure concerns.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// The provider scheme that was consulted.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The external category of the failure.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The underlying cause. Audit use only; never echo this to users.
    pub fn audit_cause(&self) -> &Error {
        &self.cause
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot resolve secret reference {} via provider {}: {}",
            self.reference, self.provider, self.kind
        )
    }
}

impl std::fmt::Debug for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveError")
            .field("reference", &self.reference)
            .field("provider", &self.provider)
            .field("kind", &self.kind)
            .field("cause", &"[REDACTED]")
            .finish()
    }
}

impl std::error::Error for ResolveError {
    // source() stays empty so error-chain printers cannot surface the cause.
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
