//! Error types for lockyard.
//!
//! Uses thiserror for derive macros. The taxonomy keeps a strict split:
//! infrastructure failures (unreachable database, filesystem permission
//! errors) surface as `LockError` values, while ordinary contention does
//! not. A lock that could not be acquired within the timeout is an expected
//! outcome and is reported as `Ok(None)` from `get_lock`, never as an error.
//! Double-release is likewise a boolean result on the handle, not an error.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for lockyard operations.
///
/// Each variant maps to a specific exit code for the companion CLI.
#[derive(Error, Debug)]
pub enum LockError {
    /// The configured backend cannot operate in this environment.
    ///
    /// Callers must not proceed assuming exclusivity when they see this.
    #[error("lock backend unavailable: {0}")]
    Unavailable(String),

    /// A lock type or resource key is unusable in the chosen backend's
    /// storage (empty, or unsafe as a key there).
    #[error("invalid lock identifier: {0}")]
    InvalidKey(String),

    /// Filesystem infrastructure failure (not contention).
    #[error("lock storage I/O failure: {0}")]
    Io(String),

    /// Database infrastructure failure (not contention).
    #[error("lock database failure: {0}")]
    Db(#[from] rusqlite::Error),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// A lock named on the CLI was not held, so there was nothing to clear.
    #[error("{0}")]
    NotHeld(String),
}

impl LockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Unavailable(_) => exit_codes::UNAVAILABLE,
            LockError::InvalidKey(_) => exit_codes::USER_ERROR,
            LockError::Io(_) => exit_codes::BACKEND_FAILURE,
            LockError::Db(_) => exit_codes::BACKEND_FAILURE,
            LockError::Config(_) => exit_codes::USER_ERROR,
            LockError::NotHeld(_) => exit_codes::NOT_HELD,
        }
    }
}

/// Result type alias for lockyard operations.
pub type LockResult<T> = std::result::Result<T, LockError>;
