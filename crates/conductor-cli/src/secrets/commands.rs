// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! CLI surface for the secret management commands.
#![allow(clippy::disallowed_methods)] // CLI is allowed to print to stdout/stderr

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use conductor_secrets::backend::{EncryptedFileBackend, EnvBackend, KeychainBackend, SecretBackend};
use conductor_secrets::reference::{mask_value, validate_key};
use conductor_secrets::{
    BackendResolver, Error, ErrorKind, ResolveContext, SecretsConfig,
};
use std::io::{IsTerminal, Read, Write};
use std::sync::Arc;

/// Providers whose API keys the interactive prompt offers by default.
const DEFAULT_PROMPT_PROVIDERS: &[&str] = &["openai", "anthropic"];

/// Additional providers offered when CONDUCTOR_ALL_PROVIDERS=1.
const EXTRA_PROMPT_PROVIDERS: &[&str] = &["google", "mistral", "groq", "ollama"];

#[derive(Debug, Clone, Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretCommands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SecretCommands {
    /// Store a secret (value read from stdin or a hidden prompt)
    Set {
        /// Secret key, e.g. providers/openai/api_key (prompted when omitted)
        key: Option<String>,
        /// Store into this backend instead of the first writable one
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
        /// Validate and report without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Print a stored secret (masked unless --unmask)
    Get {
        /// Secret key
        key: String,
        /// Print the full value instead of first4…last4
        #[arg(long)]
        unmask: bool,
    },
    /// List stored secret keys (never values)
    List,
    /// Remove a stored secret
    Delete {
        /// Secret key
        key: String,
        /// Delete only from this backend
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendKind {
    Env,
    Keychain,
    File,
}

impl BackendKind {
    fn name(&self) -> &'static str {
        match self {
            BackendKind::Env => "env",
            BackendKind::Keychain => "keychain",
            BackendKind::File => "file",
        }
    }
}

impl SecretsArgs {
    /// Execute the command set. Returns the process exit code:
    /// 0 on success, 1 on validation errors, 2 on backend failures.
    pub async fn run(self) -> i32 {
        let result = match self.command {
            SecretCommands::Set {
                key,
                backend,
                dry_run,
            } => set_secret(key, backend, dry_run).await,
            SecretCommands::Get { key, unmask } => get_secret(&key, unmask).await,
            SecretCommands::List => list_secrets().await,
            SecretCommands::Delete {
                key,
                backend,
                force,
            } => delete_secret(&key, backend, force).await,
        };

        match result {
            Ok(()) => 0,
            Err(err) => {
                let (code, hint) = classify(&err);
                tracing::debug!(%err, code, "secrets command failed");
                eprintln!("error: {err}");
                if let Some(hint) = hint {
                    eprintln!("hint: {hint}");
                }
                code
            }
        }
    }
}

fn classify(err: &anyhow::Error) -> (i32, Option<&'static str>) {
    let kind = err
        .downcast_ref::<Error>()
        .map(|e| e.kind())
        .or_else(|| err.downcast_ref::<conductor_secrets::ResolveError>().map(|e| e.kind()));
    match kind {
        Some(kind @ (ErrorKind::InvalidSyntax | ErrorKind::Validation)) => {
            (1, Some(kind.remediation_hint()))
        }
        Some(kind) => (2, Some(kind.remediation_hint())),
        None => (2, None),
    }
}

/// The CLI's backend chain: env, keychain, encrypted file.
///
/// Public so integration tests can wire it against a throwaway config
/// directory; the commands use the default configuration (which honours
/// CONDUCTOR_HOME).
pub fn build_resolver(config: &SecretsConfig) -> Result<BackendResolver> {
    Ok(BackendResolver::new(vec![
        Arc::new(EnvBackend::new()) as Arc<dyn SecretBackend>,
        Arc::new(KeychainBackend::new()),
        Arc::new(EncryptedFileBackend::new(config, None)?),
    ]))
}

fn all_providers_enabled() -> bool {
    std::env::var("CONDUCTOR_ALL_PROVIDERS").map(|v| v == "1").unwrap_or(false)
}

/// Interactive key selection: offer the provider API keys a fresh setup
/// usually needs. CONDUCTOR_ALL_PROVIDERS=1 widens the list.
fn prompt_for_key() -> Result<String> {
    if !std::io::stdin().is_terminal() {
        return Err(Error::Validation(
            "a secret key argument is required when stdin is not a terminal".to_string(),
        )
        .into());
    }

    let mut providers: Vec<&str> = DEFAULT_PROMPT_PROVIDERS.to_vec();
    if all_providers_enabled() {
        providers.extend_from_slice(EXTRA_PROMPT_PROVIDERS);
    }

    eprintln!("Store an API key for which provider?");
    for (index, name) in providers.iter().enumerate() {
        eprintln!("  {}) {}", index + 1, name);
    }
    eprint!("Selection [1-{}]: ", providers.len());
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let choice: usize = line
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("invalid selection: {}", line.trim())))?;
    let name = providers
        .get(choice.wrapping_sub(1))
        .ok_or_else(|| Error::Validation(format!("invalid selection: {choice}")))?;
    Ok(format!("providers/{name}/api_key"))
}

fn read_value(key: &str) -> Result<String> {
    let value = if std::io::stdin().is_terminal() {
        rpassword::prompt_password(format!("Value for {key}: "))?
    } else {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    };
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        return Err(Error::InvalidSyntax("secret value cannot be empty".to_string()).into());
    }
    Ok(trimmed)
}

async fn set_secret(
    key: Option<String>,
    backend: Option<BackendKind>,
    dry_run: bool,
) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => prompt_for_key()?,
    };
    validate_key(&key)?;
    let value = read_value(&key)?;

    if dry_run {
        let target = backend.map(|b| b.name()).unwrap_or("first writable backend");
        println!("dry-run: would store {key} in {target}");
        return Ok(());
    }

    let resolver = build_resolver(&SecretsConfig::default())?;
    let ctx = ResolveContext::new();
    let used = resolver
        .set(&ctx, &key, &value, backend.map(|b| b.name()))
        .await?;
    println!("Stored {key} in {used}");
    Ok(())
}

async fn get_secret(key: &str, unmask: bool) -> Result<()> {
    validate_key(key)?;
    let resolver = build_resolver(&SecretsConfig::default())?;
    let ctx = ResolveContext::new();
    let value = resolver.get(&ctx, key).await?;
    if unmask {
        println!("{value}");
    } else {
        println!("{}", mask_value(&value));
    }
    Ok(())
}

async fn list_secrets() -> Result<()> {
    let resolver = build_resolver(&SecretsConfig::default())?;
    let ctx = ResolveContext::new();
    let entries = resolver.list(&ctx).await?;

    if entries.is_empty() {
        println!("No stored secrets.");
        return Ok(());
    }

    let key_width = entries
        .iter()
        .map(|e| e.key.len())
        .max()
        .unwrap_or(0)
        .max("KEY".len());
    println!("{:<key_width$}  {:<10}  {}", "KEY", "BACKEND", "READ-ONLY");
    for entry in entries {
        println!(
            "{:<key_width$}  {:<10}  {}",
            entry.key,
            entry.backend,
            if entry.read_only { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn confirm_delete(key: &str) -> Result<bool> {
    eprint!("Delete secret '{key}'? [y/N] ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

async fn delete_secret(key: &str, backend: Option<BackendKind>, force: bool) -> Result<()> {
    validate_key(key)?;
    if !force && !confirm_delete(key)? {
        println!("Aborted.");
        return Ok(());
    }

    let resolver = build_resolver(&SecretsConfig::default())?;
    let ctx = ResolveContext::new();
    resolver
        .delete(&ctx, key, backend.map(|b| b.name()))
        .await?;
    println!("Deleted {key}");
    Ok(())
}
