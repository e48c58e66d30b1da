//! Command implementations for the lockyard CLI.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations and resolves configuration once per invocation.

mod clear;
mod list;
mod status;

use std::path::Path;

use lockyard::config::LockConfig;
use lockyard::error::LockResult;

use crate::cli::{Cli, Command};

/// Default config file looked for in the working directory.
const DEFAULT_CONFIG_FILE: &str = "lockyard.yaml";

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> LockResult<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Status => status::cmd_status(&config),
        Command::List => list::cmd_list(&config),
        Command::Clear(args) => clear::cmd_clear(&config, &args.lock_type, &args.resource),
    }
}

/// Resolve the configuration for this invocation.
///
/// An explicit `--config` path must exist and parse. Without one,
/// `lockyard.yaml` in the working directory is used if present, and
/// built-in defaults otherwise.
fn resolve_config(explicit: Option<&Path>) -> LockResult<LockConfig> {
    match explicit {
        Some(path) => LockConfig::load(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                LockConfig::load(default_path)
            } else {
                Ok(LockConfig::default())
            }
        }
    }
}
