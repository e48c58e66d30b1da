//! Implementation of the `lockyard status` command.
//!
//! Constructs the configured backend for a probe lock type and reports
//! availability plus the capability flags callers would see.

use lockyard::config::{lock_factory, BackendKind, LockConfig};
use lockyard::error::LockResult;

/// Lock type used only to probe the backend.
const PROBE_LOCK_TYPE: &str = "default";

/// Execute the `lockyard status` command.
pub fn cmd_status(config: &LockConfig) -> LockResult<()> {
    let factory = lock_factory(config, PROBE_LOCK_TYPE)?;

    println!("Lock Backend Status");
    println!("===================");
    println!();
    println!("  backend:        {}", config.backend.as_str());
    match config.backend {
        BackendKind::File => println!("  lock dir:       {}", config.lock_dir.display()),
        BackendKind::Db => println!("  database:       {}", config.db_path.display()),
        BackendKind::Memory => println!("  store:          process memory (no cross-process exclusion)"),
    }
    println!();
    println!("  available:      {}", yes_no(factory.is_available()));
    println!("  timeout:        {}", yes_no(factory.supports_timeout()));
    println!("  recursion:      {}", yes_no(factory.supports_recursion()));
    println!("  auto-release:   {}", yes_no(factory.supports_auto_release()));

    if !factory.is_available() {
        println!();
        println!("This backend cannot guard critical sections here; callers");
        println!("relying on it must fall back or abort.");
    }
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
