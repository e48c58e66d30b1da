//! Lockyard: pluggable cross-process advisory locking.
//!
//! Multiple independent processes coordinate on named resources through
//! one abstraction: a [`LockFactory`] scoped to a lock type (a namespace
//! string), issuing [`Lock`] handles on resource keys. Identical keys in
//! different lock types never collide.
//!
//! Three interchangeable backends implement the factory trait, selected by
//! [`LockConfig`]:
//! - database rows in a shared SQLite table,
//! - OS advisory file locks in a shared directory,
//! - a process-local grant-everything registry for tests.
//!
//! Backends differ in what they can promise, reported through capability
//! flags (timeout, recursion, auto-release); callers check the flags
//! before relying on a behavior. Contention is an expected outcome:
//! `get_lock` answers `Ok(None)` on timeout, and errors are reserved for
//! infrastructure failures that must not be mistaken for "lock busy".
//!
//! ```no_run
//! use std::time::Duration;
//! use lockyard::{lock_factory, LockConfig};
//!
//! # fn main() -> lockyard::LockResult<()> {
//! let config = LockConfig::default();
//! let factory = lock_factory(&config, "tool_task")?;
//!
//! if let Some(mut lock) = factory.get_lock("cron", Duration::from_secs(2))? {
//!     // critical section
//!     lock.release();
//! } else {
//!     // someone else holds it; retry later or skip
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod factory;
pub mod handle;

pub use config::{lock_factory, BackendKind, LockConfig};
pub use error::{LockError, LockResult};
pub use factory::LockFactory;
pub use handle::Lock;
