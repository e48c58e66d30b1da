//! Implementation of the `lockyard clear` command.
//!
//! Force-clears one lock's backend state. The caller is responsible for
//! being sure the holder is really gone; clearing a live lock removes its
//! protection.

use lockyard::backend::{db, file};
use lockyard::config::{BackendKind, LockConfig};
use lockyard::error::{LockError, LockResult};

/// Execute the `lockyard clear` command.
pub fn cmd_clear(config: &LockConfig, lock_type: &str, resource: &str) -> LockResult<()> {
    match config.backend {
        BackendKind::File => {
            let metadata = file::force_clear(&config.lock_dir, lock_type, resource)?;
            println!(
                "Cleared lock {}/{} (was held by {}, {} ago)",
                lock_type,
                resource,
                metadata.owner,
                metadata.age_string()
            );
            Ok(())
        }
        BackendKind::Db => {
            let owner = db::force_clear(&config.db_path, lock_type, resource)?;
            println!(
                "Cleared lock {}/{} (row was owned by {})",
                lock_type, resource, owner
            );
            Ok(())
        }
        BackendKind::Memory => Err(LockError::NotHeld(
            "memory backend locks live in their holder's process and cannot be cleared externally"
                .to_string(),
        )),
    }
}
