//! Exit code constants for the `rwlockfile` binary.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, invalid lock target)
//! - 2: Lock acquisition failure (timed out while another owner held the lock)
//! - 3: I/O failure or unreadable lock state
//! - 4: Internal invariant violation

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or a mismatched lock target.
pub const USER_ERROR: i32 = 1;

/// Lock acquisition failure: the lock stayed held until the timeout ran out.
pub const LOCK_FAILURE: i32 = 2;

/// Filesystem failure or a lock state file that could not be parsed.
pub const IO_FAILURE: i32 = 3;

/// Internal invariant violation, such as an unexpected lock status.
pub const INTERNAL_ERROR: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, LOCK_FAILURE, IO_FAILURE, INTERNAL_ERROR];
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
