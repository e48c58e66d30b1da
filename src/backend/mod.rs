//! Lock backend implementations.
//!
//! Three interchangeable strategies back the [`crate::factory::LockFactory`]
//! trait:
//! - [`db::DbLockFactory`]: a row per lock in a SQLite table, acquisition
//!   guarded by the database's own atomicity, explicit expiry honored
//!   lazily on later acquisition attempts.
//! - [`file::FileLockFactory`]: an exclusive OS advisory lock (`flock`) on
//!   a per-resource file, auto-released by the OS when the holder dies.
//! - [`memory::MemoryLockFactory`]: a process-local registry that grants
//!   every request; for tests and constrained environments only.
//!
//! # Polling contract
//!
//! Backends that support timeouts wait by polling: an immediate first
//! attempt, then retries every [`POLL_INTERVAL`] until the deadline. A zero
//! timeout is exactly one attempt. The wait terminates no later than the
//! timeout plus one interval of slack. No fairness across waiters is
//! promised; starvation is acceptable.

pub mod db;
pub mod file;
pub mod memory;
mod metadata;

#[cfg(test)]
mod tests;

pub use metadata::LockMetadata;

use std::time::{Duration, Instant};

use crate::error::LockResult;

/// Interval between acquisition attempts while waiting on a timeout.
///
/// Short enough that the 0.5 s slack bound in the acquisition contract
/// holds with room to spare.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `attempt` until it grants, the timeout elapses, or it fails hard.
///
/// `attempt` returns `Ok(Some(_))` when the lock was granted, `Ok(None)`
/// on contention, and `Err` on infrastructure failure, which aborts the
/// wait immediately.
pub(crate) fn acquire_with_polling<T>(
    timeout: Duration,
    mut attempt: impl FnMut() -> LockResult<Option<T>>,
) -> LockResult<Option<T>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(granted) = attempt()? {
            return Ok(Some(granted));
        }
        let now = Instant::now();
        if timeout.is_zero() || now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
