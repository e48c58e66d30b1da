//! Lock handles.
//!
//! A [`Lock`] represents one acquired lock and is owned exclusively by the
//! caller that acquired it. Release is explicit and idempotent: the first
//! `release()` returns true, any later call returns false. If the caller
//! forgets, the handle releases itself on drop (RAII) and logs a warning,
//! since the supported path is an explicit release whose result is checked.
//!
//! A handle never goes back to the held state; re-acquiring a resource
//! always produces a new handle.

use std::fs::File;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::backend;

/// Backend-specific state needed to release a held lock.
///
/// One variant per backend; constructed only by the backend that granted
/// the lock.
#[derive(Debug)]
pub(crate) enum HandleState {
    /// Row in the lock table, guarded by the holder's owner token.
    Db {
        conn: Arc<Mutex<Connection>>,
        owner: String,
    },
    /// Open file descriptor carrying the OS advisory lock.
    File { file: File },
    /// Entry in the process-wide in-memory registry.
    Memory,
}

/// One acquired lock on a (lock type, resource key) pair.
///
/// Constructed only on successful acquisition, so a live handle always
/// started out held.
#[derive(Debug)]
pub struct Lock {
    lock_type: String,
    resource: String,
    /// `Some` while held; taken on release.
    state: Option<HandleState>,
}

impl Lock {
    pub(crate) fn new(lock_type: &str, resource: &str, state: HandleState) -> Self {
        Self {
            lock_type: lock_type.to_string(),
            resource: resource.to_string(),
            state: Some(state),
        }
    }

    /// The lock type (namespace) this lock belongs to.
    pub fn lock_type(&self) -> &str {
        &self.lock_type
    }

    /// The resource key this lock protects.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Whether this handle still holds the lock.
    pub fn is_held(&self) -> bool {
        self.state.is_some()
    }

    /// Release the lock.
    ///
    /// Returns true if the lock was held and is now released, false if it
    /// was already released (double-release is a no-op, not an error).
    /// Backend failures during release are logged and reported as false
    /// rather than panicking.
    pub fn release(&mut self) -> bool {
        let Some(state) = self.state.take() else {
            return false;
        };

        let released = match state {
            HandleState::Db { conn, owner } => {
                backend::db::release_row(&conn, &self.lock_type, &self.resource, &owner)
            }
            HandleState::File { file } => backend::file::release_file(file),
            HandleState::Memory => backend::memory::release_entry(&self.lock_type, &self.resource),
        };

        if released {
            tracing::debug!(
                lock_type = %self.lock_type,
                resource = %self.resource,
                "released lock"
            );
        }
        released
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if self.state.is_some() {
            tracing::warn!(
                lock_type = %self.lock_type,
                resource = %self.resource,
                "lock handle dropped while held; releasing"
            );
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::backend::memory::MemoryLockFactory;
    use crate::factory::LockFactory;

    #[test]
    fn accessors_report_identity() {
        let factory = MemoryLockFactory::new("handle_tests");
        let mut lock = factory
            .get_lock("cron", Duration::ZERO)
            .unwrap()
            .expect("memory backend grants immediately");
        assert_eq!(lock.lock_type(), "handle_tests");
        assert_eq!(lock.resource(), "cron");
        assert!(lock.is_held());
        assert!(lock.release());
    }

    #[test]
    fn double_release_returns_false() {
        let factory = MemoryLockFactory::new("handle_tests");
        let mut lock = factory.get_lock("abc", Duration::ZERO).unwrap().unwrap();
        assert!(lock.release());
        assert!(!lock.release());
        assert!(!lock.is_held());
    }
}
