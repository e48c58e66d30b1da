//! The lock factory abstraction.
//!
//! A factory produces locks on named resources within one lock type
//! (a namespace string, e.g. a subsystem name). Identical resource keys in
//! different lock types never collide. Backends are interchangeable behind
//! this trait; which one is constructed is decided by [`crate::config`].
//!
//! # Capability flags
//!
//! Not every backend can promise the same semantics, so callers inspect
//! capability flags before relying on a behavior:
//!
//! - `is_available`: whether the backend can operate in this environment at
//!   all. An unavailable factory must never be used to guard a critical
//!   section; it refuses acquisition with [`LockError::Unavailable`] rather
//!   than silently no-opping.
//! - `supports_timeout`: whether a non-zero timeout is honored by waiting.
//!   Backends without timeout support never block: they make a single
//!   attempt and answer immediately.
//! - `supports_recursion`: whether the same caller may stack a second
//!   handle on an already-held key. Each stacked handle is released
//!   independently, and the resource is only free once all are released.
//! - `supports_auto_release`: whether the backend drops a lock on its own
//!   when the holder dies (OS- or process-lifetime lease). Backends
//!   without auto-release honor an explicit expiry passed at acquisition
//!   instead, checked lazily on later acquisition attempts.

use std::time::Duration;

use crate::error::{LockError, LockResult};
use crate::handle::Lock;

/// Factory for locks on named resources within one lock type.
///
/// Acquisition failure from contention is an expected outcome and is
/// reported as `Ok(None)`; `Err` is reserved for infrastructure failures.
pub trait LockFactory {
    /// The lock type (namespace) this factory issues locks for.
    fn lock_type(&self) -> &str;

    /// Whether this backend can operate in the current environment.
    fn is_available(&self) -> bool;

    /// Whether non-zero timeouts are honored by waiting.
    fn supports_timeout(&self) -> bool;

    /// Whether the same caller may stack a second handle on a held key.
    fn supports_recursion(&self) -> bool;

    /// Whether held locks are dropped automatically when the holder dies.
    fn supports_auto_release(&self) -> bool;

    /// Try to acquire a lock on `resource`, waiting up to `timeout`.
    ///
    /// A zero timeout means a single non-blocking attempt. Returns
    /// `Ok(Some(lock))` on success and `Ok(None)` when the lock could not
    /// be acquired in time; callers are expected to retry or skip.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures (unreachable
    /// database, filesystem I/O error, unavailable backend) or an invalid
    /// resource key. Contention is never an error.
    fn get_lock(&self, resource: &str, timeout: Duration) -> LockResult<Option<Lock>> {
        self.get_lock_with_expiry(resource, timeout, Duration::ZERO)
    }

    /// Like [`get_lock`](Self::get_lock), with an explicit expiry lease.
    ///
    /// On backends without auto-release, a lock acquired with a non-zero
    /// `expiry` becomes acquirable by a different caller once wall-clock
    /// time passes the lease, even if never explicitly released. Backends
    /// with auto-release ignore `expiry`. A zero `expiry` means no lease.
    fn get_lock_with_expiry(
        &self,
        resource: &str,
        timeout: Duration,
        expiry: Duration,
    ) -> LockResult<Option<Lock>>;
}

/// Reject resource keys that no backend should be asked to store.
pub(crate) fn validate_resource_key(resource: &str) -> LockResult<()> {
    if resource.is_empty() {
        return Err(LockError::InvalidKey("empty resource key".to_string()));
    }
    Ok(())
}

/// Reject lock type strings that no backend should be asked to store.
///
/// Lock types name directories (file backend) and rows (db backend), so
/// they are held to a stricter charset than resource keys, which are
/// sanitized per backend.
pub(crate) fn validate_lock_type(lock_type: &str) -> LockResult<()> {
    if lock_type.is_empty() {
        return Err(LockError::InvalidKey("empty lock type".to_string()));
    }
    if !lock_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LockError::InvalidKey(format!(
            "lock type '{}' may only contain alphanumerics, '_' and '-'",
            lock_type
        )));
    }
    Ok(())
}
