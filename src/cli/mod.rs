//! CLI argument parsing for lockyard.
//!
//! Uses clap derive macros for declarative argument definitions. This
//! module defines the command structure; actual implementations are in the
//! `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lockyard: inspect and recover cross-process advisory locks.
///
/// The library does the locking; this binary is for operators:
/// - check which backend is configured and whether it can operate here
/// - list currently held locks with holder metadata
/// - force-clear a lock left behind by a dead holder
#[derive(Parser, Debug)]
#[command(name = "lockyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file (default: ./lockyard.yaml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for lockyard.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the configured backend, its availability, and capability flags.
    Status,

    /// List currently held locks with owner, age, and staleness.
    List,

    /// Force-clear an orphaned lock.
    ///
    /// Clears the named lock's backend state regardless of who holds it.
    /// For recovery after a holder died; clearing a live lock removes its
    /// protection.
    Clear(ClearArgs),
}

/// Arguments for the `clear` command.
#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    /// Lock type (namespace) of the lock to clear.
    pub lock_type: String,

    /// Resource key of the lock to clear.
    pub resource: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
