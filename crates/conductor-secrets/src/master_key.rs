// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Master key resolution for the encrypted file backend.
//!
//! Sources, in priority order:
//! 1. an explicit constructor argument,
//! 2. the `CONDUCTOR_MASTER_KEY` environment variable,
//! 3. the `master.key` file in the config directory (mode 0600, no symlink).
//!
//! When no source yields a key the file backend is still constructed but
//! reports itself unavailable.

use std::path::Path;
use zeroize::Zeroizing;

/// Environment variable carrying the master key.
pub const MASTER_KEY_ENV: &str = "CONDUCTOR_MASTER_KEY";

/// File name of the master key file inside the config directory.
pub const MASTER_KEY_FILE: &str = "master.key";

/// Resolve the master key, or `None` when no source yields one.
pub fn resolve_master_key(
    explicit: Option<&str>,
    key_file: &Path,
) -> Option<Zeroizing<Vec<u8>>> {
    if let Some(key) = explicit {
        if !key.is_empty() {
            return Some(Zeroizing::new(key.as_bytes().to_vec()));
        }
    }

    if let Ok(key) = std::env::var(MASTER_KEY_ENV) {
        if !key.is_empty() {
            return Some(Zeroizing::new(key.into_bytes()));
        }
    }

    read_key_file(key_file)
}

fn read_key_file(path: &Path) -> Option<Zeroizing<Vec<u8>>> {
    let meta = std::fs::symlink_metadata(path).ok()?;

    if meta.file_type().is_symlink() {
        tracing::warn!("refusing symlinked master key file: {}", path.display());
        return None;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                "refusing master key file with group/other access: {}",
                path.display()
            );
            return None;
        }
    }

    let content = std::fs::read(path).ok()?;
    let trimmed: &[u8] = {
        let mut slice = content.as_slice();
        while let [rest @ .., last] = slice {
            if last.is_ascii_whitespace() {
                slice = rest;
            } else {
                break;
            }
        }
        slice
    };
    if trimmed.is_empty() {
        return None;
    }
    Some(Zeroizing::new(trimmed.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[cfg(unix)]
    fn write_key_file(dir: &Path, name: &str, content: &[u8], mode: u32) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_explicit_key_wins() {
        let dir = tempfile::tempdir().unwrap();
        let key = resolve_master_key(Some("mk-explicit"), &dir.path().join("master.key"));
        assert_eq!(key.unwrap().as_slice(), b"mk-explicit");
    }

    #[test]
    fn test_empty_explicit_key_ignored() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_master_key(Some(""), &dir.path().join("master.key")).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_trailing_newline_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_key_file(dir.path(), "master.key", b"mk-file\n", 0o600);
        let key = resolve_master_key(None, &path);
        assert_eq!(key.unwrap().as_slice(), b"mk-file");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_group_readable_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_key_file(dir.path(), "master.key", b"mk-file", 0o640);
        assert!(resolve_master_key(None, &path).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_key_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let target = write_key_file(dir.path(), "real.key", b"mk-file", 0o600);
        let link = dir.path().join("master.key");
        std::os::unix::fs::symlink(&target, &link).unwrap();
        assert!(resolve_master_key(None, &link).is_none());
    }

    #[test]
    fn test_missing_everything_yields_none() {
        std::env::remove_var(MASTER_KEY_ENV);
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_master_key(None, &dir.path().join("absent.key")).is_none());
    }
}
