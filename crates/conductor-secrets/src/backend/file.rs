// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Encrypted file backend.
//!
//! All secrets live in one AES-256-GCM-encrypted JSON map on disk
//! (`secrets.enc`). Every mutation re-encrypts the whole map under a fresh
//! salt and nonce and replaces the file atomically (temp + rename). A single
//! RW lock guards each load/save pair; the lock is held through Argon2id
//! derivation, which can take tens of milliseconds — secret writes are rare.
//!
//! Cross-process coordination is out of scope for this backend; one writer
//! process is assumed.

use crate::backend::{SecretBackend, FILE_PRIORITY};
use crate::config::SecretsConfig;
use crate::context::ResolveContext;
use crate::crypto::{decrypt_secret_map, encrypt_secret_map};
use crate::error::{Error, Result};
use crate::master_key::resolve_master_key;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use zeroize::Zeroizing;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Backend storing secrets in an encrypted file under the config directory.
pub struct EncryptedFileBackend {
    path: PathBuf,
    master_key: Option<Zeroizing<Vec<u8>>>,
    state: RwLock<()>,
}

impl EncryptedFileBackend {
    /// Construct from configuration. The master key is resolved from the
    /// explicit argument, the environment, or the key file; when none yields
    /// a key the backend exists but reports itself unavailable.
    pub fn new(config: &SecretsConfig, explicit_master_key: Option<&str>) -> Result<Self> {
        let path = config.secrets_file()?;
        let master_key = resolve_master_key(explicit_master_key, &config.master_key_file()?);
        Ok(Self {
            path,
            master_key,
            state: RwLock::new(()),
        })
    }

    /// Construct against an explicit store path (used by tests).
    pub fn at_path(path: PathBuf, master_key: Option<&str>) -> Self {
        Self {
            path,
            master_key: master_key.map(|k| Zeroizing::new(k.as_bytes().to_vec())),
            state: RwLock::new(()),
        }
    }

    fn key(&self) -> Result<&Zeroizing<Vec<u8>>> {
        self.master_key
            .as_ref()
            .ok_or_else(|| Error::Unavailable("file".to_string()))
    }

    fn check_not_symlink(path: &Path) -> Result<()> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => Err(Error::AccessDenied(format!(
                "secrets store must not be a symlink: {}",
                path.display()
            ))),
            _ => Ok(()),
        }
    }

    fn check_private_mode(path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            let meta = std::fs::metadata(path)?;
            if meta.permissions().mode() & 0o077 != 0 {
                return Err(Error::PermissionDenied(path.to_path_buf()));
            }
        }
        Ok(())
    }

    /// Read and decrypt the store. Caller must hold the lock.
    async fn load_map(&self, ctx: &ResolveContext) -> Result<BTreeMap<String, String>> {
        Self::check_not_symlink(&self.path)?;
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        Self::check_private_mode(&self.path)?;

        let content = tokio::fs::read(&self.path).await?;
        let master_key = self.key()?.clone();
        // Argon2id derivation is CPU-bound; keep it off the async threads.
        ctx.run_blocking("decrypt secrets store", move || {
            decrypt_secret_map(&content, &master_key)
        })
        .await
    }

    /// Encrypt and atomically replace the store. Caller must hold the lock.
    async fn save_map(&self, ctx: &ResolveContext, map: BTreeMap<String, String>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| Error::Config("secrets store has no parent directory".to_string()))?
            .to_path_buf();
        if !parent.exists() {
            tokio::fs::create_dir_all(&parent).await?;
        }
        #[cfg(unix)]
        {
            let mut perms = tokio::fs::metadata(&parent).await?.permissions();
            perms.set_mode(0o700);
            tokio::fs::set_permissions(&parent, perms).await?;
        }
        Self::check_not_symlink(&self.path)?;

        let master_key = self.key()?.clone();
        let path = self.path.clone();
        let temp = self.path.with_extension("enc.tmp");
        ctx.run_blocking("encrypt secrets store", move || {
            let content = encrypt_secret_map(&map, &master_key)?;
            let mut map = map;
            for value in map.values_mut() {
                zeroize::Zeroize::zeroize(value);
            }
            drop(map);

            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp)?;
            #[cfg(unix)]
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            file.write_all(&content)?;
            file.sync_all()?;
            drop(file);

            std::fs::rename(&temp, &path)?;
            Self::check_private_mode(&path)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl SecretBackend for EncryptedFileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn priority(&self) -> i32 {
        FILE_PRIORITY
    }

    fn available(&self) -> bool {
        self.master_key.is_some()
    }

    async fn get(&self, ctx: &ResolveContext, key: &str) -> Result<String> {
        let _guard = self.state.read().await;
        let mut map = self.load_map(ctx).await?;
        match map.remove(key) {
            Some(value) => {
                for leftover in map.values_mut() {
                    zeroize::Zeroize::zeroize(leftover);
                }
                Ok(value)
            }
            None => {
                for leftover in map.values_mut() {
                    zeroize::Zeroize::zeroize(leftover);
                }
                Err(Error::NotFound(key.to_string()))
            }
        }
    }

    async fn set(&self, ctx: &ResolveContext, key: &str, value: &str) -> Result<()> {
        let _guard = self.state.write().await;
        let mut map = self.load_map(ctx).await?;
        map.insert(key.to_string(), value.to_string());
        self.save_map(ctx, map).await
    }

    async fn delete(&self, ctx: &ResolveContext, key: &str) -> Result<()> {
        let _guard = self.state.write().await;
        let mut map = self.load_map(ctx).await?;
        if map.remove(key).is_none() {
            for leftover in map.values_mut() {
                zeroize::Zeroize::zeroize(leftover);
            }
            return Err(Error::NotFound(key.to_string()));
        }
        self.save_map(ctx, map).await
    }

    async fn list(&self, ctx: &ResolveContext) -> Result<Vec<String>> {
        let _guard = self.state.read().await;
        let mut map = self.load_map(ctx).await?;
        let keys = map.keys().cloned().collect();
        for value in map.values_mut() {
            zeroize::Zeroize::zeroize(value);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn backend_in(dir: &Path, master_key: Option<&str>) -> EncryptedFileBackend {
        EncryptedFileBackend::at_path(dir.join("secrets.enc"), master_key)
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(dir.path(), Some("mk-1"));
        let ctx = ResolveContext::new();

        backend.set(&ctx, "a/b", "v1").await.unwrap();
        assert_eq!(backend.get(&ctx, "a/b").await.unwrap(), "v1");

        // A new instance over the same file sees the same data.
        let reopened = backend_in(dir.path(), Some("mk-1"));
        assert_eq!(reopened.get(&ctx, "a/b").await.unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_wrong_master_key_is_not_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ResolveContext::new();
        backend_in(dir.path(), Some("mk-1"))
            .set(&ctx, "a/b", "v1")
            .await
            .unwrap();

        let err = backend_in(dir.path(), Some("mk-2"))
            .get(&ctx, "a/b")
            .await
            .unwrap_err();
        assert_ne!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("wrong master key or corrupted data"));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(dir.path(), Some("mk-1"));
        let ctx = ResolveContext::new();
        let err = backend.get(&ctx, "absent").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_no_master_key_means_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(dir.path(), None);
        assert!(!backend.available());

        let ctx = ResolveContext::new();
        let err = backend.set(&ctx, "a/b", "v").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_written_file_is_private() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(dir.path(), Some("mk-1"));
        let ctx = ResolveContext::new();
        backend.set(&ctx, "a/b", "v1").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("secrets.enc"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o077, 0, "mode {mode:o} leaks to group/other");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_store_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.enc");
        std::fs::write(&real, b"{}").unwrap();
        let link = dir.path().join("secrets.enc");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let backend = EncryptedFileBackend::at_path(link, Some("mk-1"));
        let ctx = ResolveContext::new();
        let err = backend.get(&ctx, "a/b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(dir.path(), Some("mk-1"));
        let ctx = ResolveContext::new();

        backend.set(&ctx, "a/b", "v1").await.unwrap();
        backend.set(&ctx, "c/d", "v2").await.unwrap();
        assert_eq!(
            backend.list(&ctx).await.unwrap(),
            vec!["a/b".to_string(), "c/d".to_string()]
        );

        backend.delete(&ctx, "a/b").await.unwrap();
        assert_eq!(backend.list(&ctx).await.unwrap(), vec!["c/d".to_string()]);

        let err = backend.delete(&ctx, "a/b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(dir.path(), Some("mk-1"));
        let ctx = ResolveContext::new();
        backend.set(&ctx, "a/b", "one").await.unwrap();
        backend.set(&ctx, "a/b", "two").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["secrets.enc".to_string()]);
        assert_eq!(backend.get(&ctx, "a/b").await.unwrap(), "two");
    }
}
