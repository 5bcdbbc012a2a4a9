// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Cross-process settings-file write path.
//!
//! The settings file embeds secret references (never values), and other
//! conductor processes may write it concurrently. Each update walks
//! Unlocked -> Locked -> WritingTemp -> Renamed -> Unlocked:
//!
//! 1. take an OS exclusive lock on the sibling `.lock` file, bounded by a
//!    timeout (a distinct error so callers can tell the user who to blame),
//! 2. read-modify-write the YAML document,
//! 3. rotate a timestamped backup, keeping the three most recent,
//! 4. write a 0600 temp file and rename it into place.

use crate::error::{Error, Result};
use chrono::Utc;
use fs2::FileExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// How long to wait for the cross-process lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// How many timestamped backups to retain.
pub const BACKUPS_KEPT: usize = 3;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Serialises settings-file updates across processes.
pub struct SettingsWriter {
    path: PathBuf,
    lock_timeout: Duration,
}

impl SettingsWriter {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the lock timeout (tests use a short one).
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The sibling lock file path (`settings.yaml` -> `settings.yaml.lock`).
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push_str(".lock");
        self.path.with_file_name(name)
    }

    /// Apply `mutate` to the YAML document under the cross-process lock.
    pub async fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut serde_yaml::Value) -> Result<()> + Send + 'static,
    {
        let path = self.path.clone();
        let lock_path = self.lock_path();
        let lock_timeout = self.lock_timeout;
        tokio::task::spawn_blocking(move || {
            update_blocking(&path, &lock_path, lock_timeout, mutate)
        })
        .await
        .map_err(|e| Error::Validation(format!("settings writer worker failed: {e}")))?
    }
}

fn update_blocking<F>(
    path: &Path,
    lock_path: &Path,
    lock_timeout: Duration,
    mutate: F,
) -> Result<()>
where
    F: FnOnce(&mut serde_yaml::Value) -> Result<()>,
{
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(lock_path)?;

    // Unlocked -> Locked
    let deadline = Instant::now() + lock_timeout;
    loop {
        match lock_file.try_lock_exclusive() {
            Ok(()) => break,
            Err(_) if Instant::now() < deadline => std::thread::sleep(LOCK_POLL_INTERVAL),
            Err(_) => {
                return Err(Error::LockTimeout(lock_path.to_path_buf(), lock_timeout));
            }
        }
    }

    let result = locked_update(path, mutate);
    let _ = lock_file.unlock();
    result
}

fn locked_update<F>(path: &Path, mutate: F) -> Result<()>
where
    F: FnOnce(&mut serde_yaml::Value) -> Result<()>,
{
    let mut doc = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
        } else {
            serde_yaml::from_str(&content)?
        }
    } else {
        serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
    };

    mutate(&mut doc)?;
    let serialised = serde_yaml::to_string(&doc)?;

    if path.exists() {
        rotate_backups(path)?;
    }

    // Locked -> WritingTemp
    let temp = path.with_extension("yaml.tmp");
    {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp)?;
        #[cfg(unix)]
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(serialised.as_bytes())?;
        file.sync_all()?;
    }

    // WritingTemp -> Renamed
    std::fs::rename(&temp, path)?;
    Ok(())
}

fn rotate_backups(path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup_name = format!("{}.bak.{}", file_name, Utc::now().format("%Y%m%d-%H%M%S"));
    std::fs::copy(path, path.with_file_name(&backup_name))?;

    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let prefix = format!("{file_name}.bak.");
    let mut backups: Vec<PathBuf> = std::fs::read_dir(parent)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();
    // Timestamped names sort chronologically; newest last.
    backups.sort();
    while backups.len() > BACKUPS_KEPT {
        let stale = backups.remove(0);
        if let Err(err) = std::fs::remove_file(&stale) {
            tracing::warn!("failed to prune stale backup {}: {}", stale.display(), err);
        }
    }
    Ok(())
}
