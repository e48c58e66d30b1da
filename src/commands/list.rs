//! Implementation of the `lockyard list` command.
//!
//! Enumerates currently held locks in the configured backend's shared
//! store. The memory backend has no shared store to inspect, so listing it
//! only explains that.

use lockyard::backend::{db, file};
use lockyard::config::{BackendKind, LockConfig};
use lockyard::error::LockResult;

/// Execute the `lockyard list` command.
pub fn cmd_list(config: &LockConfig) -> LockResult<()> {
    match config.backend {
        BackendKind::File => {
            let held = file::list_held(&config.lock_dir, config.stale_minutes)?;
            if held.is_empty() {
                println!("No locks currently held under {}", config.lock_dir.display());
                return Ok(());
            }
            println!("{} lock(s) held:", held.len());
            for lock in held {
                println!("  - {}", lock);
            }
        }
        BackendKind::Db => {
            let rows = db::list_rows(&config.db_path)?;
            if rows.is_empty() {
                println!("No lock rows in {}", config.db_path.display());
                return Ok(());
            }
            println!("{} lock row(s):", rows.len());
            for row in rows {
                println!("  - {}", row);
            }
        }
        BackendKind::Memory => {
            println!("The memory backend keeps locks in process memory;");
            println!("there is no shared store to list from outside.");
        }
    }
    Ok(())
}
