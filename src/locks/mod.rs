//! Locking subsystem for rwlockfile.
//!
//! Two lock kinds coordinate processes that share nothing but a filesystem:
//! - [`Lockfile`]: an exclusive mutex
//! - [`RwLockfile`]: a read/write lock whose state is guarded by a private mutex
//!
//! # Files
//!
//! For a base path `<base>`:
//! - `Lockfile` claims the directory `<base>.lock` and records its owner in
//!   `<base>.lock.info.json`
//! - `RwLockfile` keeps its state in the JSON file `<base>.lock` and guards it
//!   with a mutex claim at `<base>.lock.lock`
//!
//! A `Lockfile` and an `RwLockfile` must therefore not share a base path.
//!
//! # Crash recovery
//!
//! Mutex claims carry a heartbeat (the directory mtime). A claim that has not
//! been refreshed within the stale threshold is removed by the next contender.
//! Read/write entries carry the owner's pid and are pruned once that process
//! is gone.
//!
//! # Guards
//!
//! [`with_lock`] and [`LockGuard`] hold one reference for a scope and release
//! it on every exit path. If release fails during drop, a warning is logged
//! but the program does not crash.

mod backoff;
mod guard;
mod heartbeat;
mod metadata;
mod mutex;
mod rwlock;
mod state;
mod types;

#[cfg(test)]
mod tests;

// Re-export public API
pub use guard::{LockGuard, LockHandle, with_lock, with_lock_sync};
pub use metadata::{FORMAT_VERSION, MutexInfo, age_since, age_string, local_hostname};
pub use mutex::{DEFAULT_RETRY_INTERVAL, Lockfile};
pub use rwlock::{DEFAULT_RW_RETRY_INTERVAL, RwLockfile, RwLockfileBuilder};
pub use state::{Job, LockFileState};
pub use types::{AcquireOptions, ClaimInfo, IfLocked, LockCounts, LockStatus, LockType};
