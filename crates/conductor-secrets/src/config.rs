// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration for the secret subsystem

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default size cap for secrets read through the file provider.
pub const DEFAULT_FILE_MAX_SIZE: u64 = 65_536;

/// Access policy for the environment provider, set per profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnvAccessPolicy {
    /// Whether environment resolution is allowed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Variable-name patterns that may be read. Empty means any variable.
    /// Patterns accept exact names, a trailing `*` (prefix match), and a
    /// leading `*` (suffix match).
    #[serde(default)]
    pub allowlist: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for EnvAccessPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowlist: Vec::new(),
        }
    }
}

impl EnvAccessPolicy {
    /// Check a variable name against the allowlist patterns.
    pub fn allows(&self, name: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.allowlist.is_empty() {
            return true;
        }
        self.allowlist.iter().any(|pattern| {
            if let Some(prefix) = pattern.strip_suffix('*') {
                name.starts_with(prefix)
            } else if let Some(suffix) = pattern.strip_prefix('*') {
                name.ends_with(suffix)
            } else {
                name == pattern
            }
        })
    }
}

/// Access policy for the file provider. Disabled unless a profile opts in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileProviderPolicy {
    /// Whether file resolution is allowed at all.
    #[serde(default)]
    pub enabled: bool,

    /// Paths (files or directory prefixes) that may be read. An entry with a
    /// trailing separator matches only as a directory prefix.
    #[serde(default)]
    pub allowlist: Vec<PathBuf>,

    /// Whether symlinked paths are acceptable.
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Maximum file size in bytes.
    #[serde(default = "default_file_max_size")]
    pub max_size: u64,
}

fn default_file_max_size() -> u64 {
    DEFAULT_FILE_MAX_SIZE
}

impl Default for FileProviderPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            allowlist: Vec::new(),
            follow_symlinks: false,
            max_size: DEFAULT_FILE_MAX_SIZE,
        }
    }
}

/// Secret-subsystem configuration section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SecretsConfig {
    /// Custom config directory. If not set, uses the standard location.
    pub config_dir: Option<PathBuf>,

    /// Environment provider policy for the active profile.
    #[serde(default)]
    pub env_policy: EnvAccessPolicy,

    /// File provider policy for the active profile.
    #[serde(default)]
    pub file_policy: FileProviderPolicy,
}

impl SecretsConfig {
    /// Resolve the config directory.
    /// Precedence: config_dir > CONDUCTOR_HOME > dirs::config_dir()/conductor
    pub fn config_dir(&self) -> Result<PathBuf, crate::Error> {
        if let Some(custom) = &self.config_dir {
            return Ok(custom.clone());
        }
        if let Ok(home) = std::env::var("CONDUCTOR_HOME") {
            if !home.is_empty() {
                return Ok(PathBuf::from(home));
            }
        }
        let base = dirs::config_dir().ok_or_else(|| {
            crate::Error::Config("could not determine config directory".to_string())
        })?;
        Ok(base.join("conductor"))
    }

    /// Path of the encrypted file-backend store.
    pub fn secrets_file(&self) -> Result<PathBuf, crate::Error> {
        Ok(self.config_dir()?.join("secrets.enc"))
    }

    /// Path of the master key file.
    pub fn master_key_file(&self) -> Result<PathBuf, crate::Error> {
        Ok(self.config_dir()?.join("master.key"))
    }

    /// Path of the settings file that carries secret references.
    pub fn settings_file(&self) -> Result<PathBuf, crate::Error> {
        Ok(self.config_dir()?.join("settings.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_precedence() {
        let config = SecretsConfig {
            config_dir: Some("/custom/path".into()),
            ..Default::default()
        };
        assert_eq!(config.config_dir().unwrap(), PathBuf::from("/custom/path"));
        assert_eq!(
            config.secrets_file().unwrap(),
            PathBuf::from("/custom/path/secrets.enc")
        );
        assert_eq!(
            config.master_key_file().unwrap(),
            PathBuf::from("/custom/path/master.key")
        );
        assert_eq!(
            config.settings_file().unwrap(),
            PathBuf::from("/custom/path/settings.yaml")
        );
    }

    #[test]
    fn test_env_policy_disabled_denies_all() {
        let policy = EnvAccessPolicy {
            enabled: false,
            allowlist: vec!["*".into()],
        };
        assert!(!policy.allows("ANY_VAR"));
    }

    #[test]
    fn test_env_policy_patterns() {
        let policy = EnvAccessPolicy {
            enabled: true,
            allowlist: vec![
                "EXACT_NAME".into(),
                "CONDUCTOR_*".into(),
                "*_API_KEY".into(),
            ],
        };
        assert!(policy.allows("EXACT_NAME"));
        assert!(policy.allows("CONDUCTOR_SECRET_FOO"));
        assert!(policy.allows("ANTHROPIC_API_KEY"));
        assert!(!policy.allows("OTHER_NAME"));
        assert!(!policy.allows("EXACT_NAME_2"));
    }

    #[test]
    fn test_env_policy_empty_allowlist_allows_all() {
        let policy = EnvAccessPolicy::default();
        assert!(policy.allows("ANYTHING"));
    }

    #[test]
    fn test_file_policy_defaults() {
        let policy = FileProviderPolicy::default();
        assert!(!policy.enabled);
        assert!(!policy.follow_symlinks);
        assert_eq!(policy.max_size, 65_536);
    }
}
