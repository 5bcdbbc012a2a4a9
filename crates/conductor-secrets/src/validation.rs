// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Static validation of secret references and binding graphs.
//!
//! Runs at profile load time, before any resolution happens. The legacy
//! `${NAME}` form is rejected here even though the runtime registry still
//! accepts it; profiles are expected to use `env:NAME`.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Maximum length of a reference chain before it counts as circular.
pub const MAX_SECRET_REFERENCE_DEPTH: usize = 10;

fn scheme_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9]*$").unwrap())
}

fn embedded_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap())
}

/// Check a reference string against the static grammar.
///
/// Total: every input is either accepted or rejected with a categorised
/// error. Plain strings without a `:` are accepted (they are literals, not
/// references).
pub fn validate_secret_reference(reference: &str) -> Result<()> {
    if reference.is_empty() {
        return Err(Error::InvalidSyntax(
            "secret reference cannot be empty".to_string(),
        ));
    }
    if reference.starts_with("${") {
        return Err(Error::InvalidSyntax(
            "legacy ${NAME} syntax is not accepted here; use env:NAME".to_string(),
        ));
    }
    if let Some((prefix, suffix)) = reference.split_once(':') {
        if !scheme_regex().is_match(prefix) {
            return Err(Error::InvalidSyntax(format!(
                "invalid reference scheme: {prefix}"
            )));
        }
        if suffix.is_empty() {
            return Err(Error::InvalidSyntax(
                "secret reference has an empty key".to_string(),
            ));
        }
    }
    Ok(())
}

/// Collect the binding names a value depends on.
///
/// Every `${NAME}` occurrence inside the value contributes `NAME`; a value
/// that is exactly `env:KEY` contributes `KEY`. Other schemes contribute no
/// cross-binding edges (a `file:` reference does not point at a binding).
pub fn extract_references(value: &str) -> Vec<String> {
    let mut refs: Vec<String> = embedded_ref_regex()
        .captures_iter(value)
        .map(|caps| caps[1].to_string())
        .collect();
    if let Some(key) = value.strip_prefix("env:") {
        if !key.is_empty() {
            refs.push(key.to_string());
        }
    }
    refs
}

/// Detect cycles and excessive depth in a binding map.
///
/// A cycle exists iff the induced dependency graph has a self-loop or a
/// strongly connected component of at least two bindings. The error carries
/// the visited chain so callers can show the loop.
pub fn detect_circular_references(bindings: &HashMap<String, String>) -> Result<()> {
    let graph: HashMap<&str, Vec<String>> = bindings
        .iter()
        .map(|(name, value)| (name.as_str(), extract_references(value)))
        .collect();

    for start in bindings.keys() {
        let mut path: Vec<String> = Vec::new();
        walk(start, &graph, &mut path)?;
    }
    Ok(())
}

fn walk(name: &str, graph: &HashMap<&str, Vec<String>>, path: &mut Vec<String>) -> Result<()> {
    if path.iter().any(|seen| seen == name) {
        let mut chain = path.clone();
        chain.push(name.to_string());
        return Err(Error::CircularReference { chain });
    }

    path.push(name.to_string());
    if path.len() >= MAX_SECRET_REFERENCE_DEPTH {
        return Err(Error::DepthExceeded { chain: path.clone() });
    }

    if let Some(deps) = graph.get(name) {
        for dep in deps {
            // Only names that are themselves bindings form edges.
            if graph.contains_key(dep.as_str()) {
                walk(dep, graph, path)?;
            }
        }
    }
    path.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_validate_accepts_scheme_references() {
        assert!(validate_secret_reference("env:OPENAI_API_KEY").is_ok());
        assert!(validate_secret_reference("keychain:providers/x/api_key").is_ok());
        assert!(validate_secret_reference("file:/etc/secret").is_ok());
        assert!(validate_secret_reference("s3:bucket/key").is_ok());
    }

    #[test]
    fn test_validate_accepts_plain_literals() {
        assert!(validate_secret_reference("just-a-value").is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(validate_secret_reference("").is_err());
        assert!(validate_secret_reference("ENV:FOO").is_err());
        assert!(validate_secret_reference("1st:key").is_err());
        assert!(validate_secret_reference("env:").is_err());
        assert!(validate_secret_reference("${LEGACY_NAME}").is_err());
    }

    #[test]
    fn test_validation_is_total() {
        // Every input gets a categorised accept or reject, never a panic.
        for input in ["", ":", "a:", ":b", "${}", "${x", "a:b:c", "\u{1F511}"] {
            match validate_secret_reference(input) {
                Ok(()) => {}
                Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidSyntax),
            }
        }
    }

    #[test]
    fn test_extract_references() {
        assert_eq!(
            extract_references("Bearer ${TOKEN} for ${USER_ID}"),
            vec!["TOKEN".to_string(), "USER_ID".to_string()]
        );
        assert_eq!(extract_references("env:API_KEY"), vec!["API_KEY".to_string()]);
        assert!(extract_references("file:/etc/secret").is_empty());
        assert!(extract_references("keychain:a/b").is_empty());
        assert!(extract_references("plain value").is_empty());
    }

    #[test]
    fn test_two_binding_cycle_detected() {
        let err = detect_circular_references(&bindings(&[("A", "env:B"), ("B", "env:A")]))
            .unwrap_err();
        match err {
            Error::CircularReference { chain } => {
                assert!(chain.iter().any(|n| n == "A"));
                assert!(chain.iter().any(|n| n == "B"));
            }
            other => panic!("expected CircularReference, got {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_detected() {
        let err =
            detect_circular_references(&bindings(&[("A", "prefix ${A} suffix")])).unwrap_err();
        assert!(matches!(err, Error::CircularReference { .. }));
    }

    #[test]
    fn test_acyclic_graph_accepted() {
        detect_circular_references(&bindings(&[
            ("A", "env:B"),
            ("B", "${C} and ${D}"),
            ("C", "plain"),
            ("D", "file:/etc/secret"),
        ]))
        .unwrap();
    }

    #[test]
    fn test_file_scheme_contributes_no_edges() {
        // B's value mentions A only through a file path; no cycle.
        detect_circular_references(&bindings(&[("A", "env:B"), ("B", "file:/srv/A")])).unwrap();
    }

    #[test]
    fn test_dependency_on_non_binding_is_fine() {
        detect_circular_references(&bindings(&[("A", "${REAL_ENV_VAR}")])).unwrap();
    }

    #[test]
    fn test_depth_limit() {
        // A0 -> A1 -> ... -> A10, a chain of length 11.
        let mut pairs: Vec<(String, String)> = Vec::new();
        for i in 0..11 {
            pairs.push((format!("A{i}"), format!("env:A{}", i + 1)));
        }
        let map: HashMap<String, String> = pairs.into_iter().collect();
        let err = detect_circular_references(&map).unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { .. }));
        assert_eq!(err.kind(), ErrorKind::CircularRef);
    }
}
