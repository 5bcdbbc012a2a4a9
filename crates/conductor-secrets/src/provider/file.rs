// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Provider for `file:PATH` references. Disabled unless a profile opts in.
//!
//! The allowlist is checked against the literal reference path AND the
//! symlink-resolved path; dropping either check would permit traversal
//! through a permitted directory into a forbidden one.

use crate::config::FileProviderPolicy;
use crate::context::ResolveContext;
use crate::error::{Error, Result};
use crate::provider::SecretProvider;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Resolves secrets from allowlisted filesystem paths.
#[derive(Debug, Default)]
pub struct FileProvider {
    policy: FileProviderPolicy,
}

impl FileProvider {
    pub fn new(policy: FileProviderPolicy) -> Self {
        Self { policy }
    }

    fn path_allowed(&self, path: &Path) -> bool {
        self.policy.allowlist.iter().any(|entry| {
            let entry_str = entry.to_string_lossy();
            if let Some(dir) = entry_str.strip_suffix(std::path::MAIN_SEPARATOR) {
                // Trailing separator: directory prefix only.
                path.starts_with(dir)
            } else {
                path == entry.as_path() || path.starts_with(entry)
            }
        })
    }

    fn check_policy(&self, literal: &Path) -> Result<PathBuf> {
        if !self.policy.enabled {
            return Err(Error::AccessDenied(
                "file provider is disabled for this profile".to_string(),
            ));
        }
        if !literal.is_absolute() {
            return Err(Error::InvalidSyntax(
                "file reference must use an absolute path".to_string(),
            ));
        }
        // Checked before touching the filesystem, so a disallowed path never
        // learns whether its target exists.
        if !self.path_allowed(literal) {
            return Err(Error::AccessDenied(
                "file reference target is not in the profile allowlist".to_string(),
            ));
        }

        let meta = std::fs::symlink_metadata(literal)
            .map_err(|_| Error::NotFound("file reference target".to_string()))?;
        if meta.file_type().is_symlink() && !self.policy.follow_symlinks {
            return Err(Error::AccessDenied(
                "file reference target is a symlink".to_string(),
            ));
        }

        let resolved = std::fs::canonicalize(literal)
            .map_err(|_| Error::NotFound("file reference target".to_string()))?;
        if !self.path_allowed(&resolved) {
            return Err(Error::AccessDenied(
                "file reference target is not in the profile allowlist".to_string(),
            ));
        }

        let size = std::fs::metadata(&resolved)?.len();
        if size > self.policy.max_size {
            return Err(Error::InvalidSyntax(format!(
                "file reference target exceeds the {} byte limit",
                self.policy.max_size
            )));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl SecretProvider for FileProvider {
    fn scheme(&self) -> &str {
        "file"
    }

    async fn resolve(&self, ctx: &ResolveContext, key: &str) -> Result<String> {
        let resolved = self.check_policy(Path::new(key))?;
        let content = ctx
            .bound("read secret file", async {
                Ok(tokio::fs::read_to_string(&resolved).await?)
            })
            .await?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(Error::NotFound("file reference target is empty".to_string()));
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn allowing(dir: &Path) -> FileProvider {
        FileProvider::new(FileProviderPolicy {
            enabled: true,
            allowlist: vec![dir.to_path_buf()],
            follow_symlinks: false,
            max_size: 65_536,
        })
    }

    #[tokio::test]
    async fn test_reads_and_trims_allowed_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("t");
        std::fs::write(&file, "  abc\n").unwrap();

        let provider = allowing(dir.path());
        let ctx = ResolveContext::new();
        assert_eq!(
            provider.resolve(&ctx, file.to_str().unwrap()).await.unwrap(),
            "abc"
        );
    }

    #[tokio::test]
    async fn test_disabled_by_default() {
        let provider = FileProvider::default();
        let ctx = ResolveContext::new();
        let err = provider.resolve(&ctx, "/etc/hostname").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_relative_path_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = allowing(dir.path());
        let ctx = ResolveContext::new();
        let err = provider.resolve(&ctx, "relative/path").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSyntax);
    }

    #[tokio::test]
    async fn test_path_outside_allowlist_denied() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let file = other.path().join("t");
        std::fs::write(&file, "secret").unwrap();

        let provider = allowing(dir.path());
        let ctx = ResolveContext::new();
        let err = provider
            .resolve(&ctx, file.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_rejected_without_follow() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real");
        std::fs::write(&target, "abc").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let provider = allowing(dir.path());
        let ctx = ResolveContext::new();
        let err = provider
            .resolve(&ctx, link.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escaping_allowlist_denied_even_when_followed() {
        let allowed = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("real");
        std::fs::write(&target, "abc").unwrap();
        let link = allowed.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let provider = FileProvider::new(FileProviderPolicy {
            enabled: true,
            allowlist: vec![allowed.path().to_path_buf()],
            follow_symlinks: true,
            max_size: 65_536,
        });
        let ctx = ResolveContext::new();
        // Literal path is allowlisted; the resolved path is not.
        let err = provider
            .resolve(&ctx, link.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big");
        std::fs::write(&file, vec![b'x'; 128]).unwrap();

        let provider = FileProvider::new(FileProviderPolicy {
            enabled: true,
            allowlist: vec![dir.path().to_path_buf()],
            follow_symlinks: false,
            max_size: 64,
        });
        let ctx = ResolveContext::new();
        let err = provider
            .resolve(&ctx, file.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSyntax);
    }

    #[tokio::test]
    async fn test_whitespace_only_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blank");
        std::fs::write(&file, " \n\t ").unwrap();

        let provider = allowing(dir.path());
        let ctx = ResolveContext::new();
        let err = provider
            .resolve(&ctx, file.to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_trailing_separator_entry_is_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("t");
        std::fs::write(&file, "abc").unwrap();

        let mut with_sep = dir.path().to_string_lossy().into_owned();
        with_sep.push(std::path::MAIN_SEPARATOR);
        let provider = FileProvider::new(FileProviderPolicy {
            enabled: true,
            allowlist: vec![PathBuf::from(&with_sep)],
            follow_symlinks: false,
            max_size: 65_536,
        });
        let ctx = ResolveContext::new();
        assert_eq!(
            provider.resolve(&ctx, file.to_str().unwrap()).await.unwrap(),
            "abc"
        );
    }
}
