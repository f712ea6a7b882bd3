//! rwlockfile: cross-process advisory locks built on plain filesystem operations.
//!
//! Processes that share nothing but a directory can coordinate through:
//! - [`Lockfile`]: an exclusive mutex claimed by creating a directory, kept
//!   fresh by a heartbeat and reclaimed once it goes stale
//! - [`RwLockfile`]: a read/write lock whose JSON state lists every reader and
//!   the writer, with entries of dead processes pruned on contention
//!
//! Both are reentrant per object: each `add` bumps a local count and only the
//! first one touches the filesystem. [`with_lock`] and [`LockGuard`] scope a
//! single reference and release it on every exit path.
//!
//! ```no_run
//! use rwlockfile::{AcquireOptions, LockType, RwLockfile};
//!
//! # async fn run() -> rwlockfile::Result<()> {
//! let lock = RwLockfile::new("/tmp/cache");
//! lock.add(LockType::Read, AcquireOptions::new().reason("reading index"))
//!     .await?;
//! // ... read shared data ...
//! lock.remove(LockType::Read).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod fs;
pub mod liveness;
pub mod locks;
pub mod registry;
pub mod single_flight;

#[cfg(test)]
mod test_support;

pub use config::LockConfig;
pub use error::{LockfileError, Result};
pub use liveness::{ProcessLiveness, SystemLiveness};
pub use locks::{
    AcquireOptions, ClaimInfo, Job, LockCounts, LockFileState, LockGuard, LockHandle, LockStatus,
    LockType, Lockfile, MutexInfo, RwLockfile, RwLockfileBuilder, with_lock, with_lock_sync,
};
pub use registry::{ShutdownGuard, install_exit_hook, release_all, shutdown_guard};
pub use single_flight::SingleFlight;
