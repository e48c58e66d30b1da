//! Exit code constants for the lockyard CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, bad config, invalid lock identifier)
//! - 2: Backend unavailable in this environment
//! - 3: Backend infrastructure failure (database or filesystem)
//! - 4: Named lock not held (nothing to clear)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or invalid identifier.
pub const USER_ERROR: i32 = 1;

/// The configured lock backend cannot operate here.
pub const UNAVAILABLE: i32 = 2;

/// Infrastructure failure: database unreachable or filesystem I/O error.
pub const BACKEND_FAILURE: i32 = 3;

/// The named lock was not held, so there was nothing to clear.
pub const NOT_HELD: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, UNAVAILABLE, BACKEND_FAILURE, NOT_HELD];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}
