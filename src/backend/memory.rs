//! In-memory lock backend.
//!
//! The grant-trivially variant of the testing backend: every request
//! succeeds immediately. A process-wide registry counts outstanding
//! handles per (lock type, resource key) so stacked handles release
//! independently and the depth is visible to diagnostics, but there is no
//! exclusion of any kind across processes.
//!
//! Do not back production critical sections with this factory. It exists
//! for tests and constrained environments where the real backends cannot
//! run, and it says so through its capability flags: recursion and
//! auto-release are both reported true because the registry lives and dies
//! with the process, and every acquisition is granted to what is, from an
//! in-process view, the same logical caller.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use crate::error::LockResult;
use crate::factory::{validate_lock_type, validate_resource_key, LockFactory};
use crate::handle::{HandleState, Lock};

/// Outstanding handle counts per (lock type, resource key).
///
/// Process-wide so that separately constructed factories of the same lock
/// type share state, the in-process analogue of the shared table or
/// directory the other backends use.
static REGISTRY: OnceLock<Mutex<HashMap<(String, String), u32>>> = OnceLock::new();

fn registry() -> MutexGuard<'static, HashMap<(String, String), u32>> {
    REGISTRY
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Count one released handle in the registry.
///
/// Returns false if no handle was outstanding, which indicates bookkeeping
/// drift and is logged.
pub(crate) fn release_entry(lock_type: &str, resource: &str) -> bool {
    let mut held = registry();
    let key = (lock_type.to_string(), resource.to_string());
    match held.get_mut(&key) {
        Some(count) if *count > 1 => {
            *count -= 1;
            true
        }
        Some(_) => {
            held.remove(&key);
            true
        }
        None => {
            tracing::warn!(
                lock_type,
                resource,
                "released a memory lock with no registry entry"
            );
            false
        }
    }
}

/// Number of outstanding handles on a (lock type, resource key) pair.
pub fn holder_depth(lock_type: &str, resource: &str) -> u32 {
    registry()
        .get(&(lock_type.to_string(), resource.to_string()))
        .copied()
        .unwrap_or(0)
}

/// Lock factory that grants every request within the process.
#[derive(Debug)]
pub struct MemoryLockFactory {
    lock_type: String,
}

impl MemoryLockFactory {
    /// Create a factory for the given lock type.
    pub fn new(lock_type: &str) -> Self {
        Self {
            lock_type: lock_type.to_string(),
        }
    }
}

impl LockFactory for MemoryLockFactory {
    fn lock_type(&self) -> &str {
        &self.lock_type
    }

    fn is_available(&self) -> bool {
        true
    }

    fn supports_timeout(&self) -> bool {
        // Never needs to wait, so any timeout is trivially honored.
        true
    }

    fn supports_recursion(&self) -> bool {
        true
    }

    fn supports_auto_release(&self) -> bool {
        // The registry dies with the process.
        true
    }

    fn get_lock_with_expiry(
        &self,
        resource: &str,
        _timeout: Duration,
        _expiry: Duration,
    ) -> LockResult<Option<Lock>> {
        validate_lock_type(&self.lock_type)?;
        validate_resource_key(resource)?;

        let mut held = registry();
        let count = held
            .entry((self.lock_type.clone(), resource.to_string()))
            .or_insert(0);
        *count += 1;

        tracing::debug!(
            lock_type = %self.lock_type,
            resource,
            depth = *count,
            "granted memory lock"
        );
        Ok(Some(Lock::new(&self.lock_type, resource, HandleState::Memory)))
    }
}
