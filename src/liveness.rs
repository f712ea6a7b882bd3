//! Process liveness probing.
//!
//! Read/write entries record the pid of their owner. When an entry blocks an
//! acquisition, the lock asks a [`ProcessLiveness`] whether that pid still
//! exists and prunes entries whose owner is gone.

use std::fmt::Debug;

/// Answers "is process `pid` alive?".
///
/// Implementations must return `false` for `pid <= 0` and must never panic
/// for a pid that does not exist.
pub trait ProcessLiveness: Send + Sync + Debug {
    fn is_alive(&self, pid: i64) -> bool;
}

/// Probes the local process table.
///
/// On Unix this sends signal 0; `EPERM` still means the process exists.
/// Elsewhere every positive pid is reported alive, so entries are only ever
/// removed by their owners or by an explicit clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLiveness;

impl ProcessLiveness for SystemLiveness {
    fn is_alive(&self, pid: i64) -> bool {
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        probe(pid)
    }
}

#[cfg(unix)]
fn probe(pid: i32) -> bool {
    // SAFETY: signal 0 performs the existence and permission checks only.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if rc == 0 {
        return true;
    }
    matches!(
        std::io::Error::last_os_error().raw_os_error(),
        Some(code) if code == libc::EPERM
    )
}

#[cfg(not(unix))]
fn probe(_pid: i32) -> bool {
    true
}

/// The pid of this process, as recorded in lock entries.
pub fn current_pid() -> i64 {
    i64::from(std::process::id())
}
