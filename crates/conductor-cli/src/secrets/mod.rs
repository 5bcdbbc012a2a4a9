// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Secret management commands.

mod commands;

pub use commands::{build_resolver, SecretCommands, SecretsArgs};
