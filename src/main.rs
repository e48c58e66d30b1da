//! Lockyard CLI entry point.
//!
//! Parses arguments, dispatches to the appropriate command handler, and
//! maps errors to exit codes. The locking itself lives in the library; see
//! the crate docs.

mod cli;
mod commands;

use std::process::ExitCode;

use cli::Cli;
use lockyard::exit_codes;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
