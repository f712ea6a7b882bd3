//! Process-wide registry of lock objects, used for exit-time cleanup.
//!
//! Every `Lockfile` and `RwLockfile` registers a weak reference to itself when
//! it is constructed. [`release_all`] walks the registry and force-releases
//! whatever is still held. Hosts call it directly, through a
//! [`ShutdownGuard`], or via [`install_exit_hook`].
//!
//! If none of these run (the process is killed), other processes fall back on
//! claim staleness and pid liveness checks.

use crate::error::Result;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, Once, PoisonError, Weak};
use tracing::{debug, warn};

/// Something holding on-disk claims that can be dropped synchronously.
pub(crate) trait Releasable: Send + Sync {
    /// Release every local claim, regardless of reference counts.
    fn force_release_sync(&self) -> Result<()>;

    /// Human-readable identity for diagnostics.
    fn describe(&self) -> String;
}

/// A set of weakly held lock objects.
#[derive(Default)]
struct Registry {
    entries: Mutex<Vec<Weak<dyn Releasable>>>,
}

impl Registry {
    fn entries(&self) -> MutexGuard<'_, Vec<Weak<dyn Releasable>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, entry: Weak<dyn Releasable>) {
        let mut entries = self.entries();
        entries.retain(|e| e.strong_count() > 0);
        entries.push(entry);
    }

    fn live_count(&self) -> usize {
        self.entries().iter().filter(|e| e.strong_count() > 0).count()
    }

    fn release_all(&self) -> usize {
        let live: Vec<Arc<dyn Releasable>> =
            self.entries().iter().filter_map(Weak::upgrade).collect();

        for entry in &live {
            match entry.force_release_sync() {
                Ok(()) => debug!(lock = %entry.describe(), "released at shutdown"),
                Err(e) => {
                    warn!(lock = %entry.describe(), error = %e, "failed to release at shutdown")
                }
            }
        }
        live.len()
    }
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::default);

pub(crate) fn register(entry: Weak<dyn Releasable>) {
    REGISTRY.register(entry);
}

/// Number of lock objects that are still alive in this process.
pub fn live_count() -> usize {
    REGISTRY.live_count()
}

/// Force-release every lock object created by this process.
///
/// Failures are logged and skipped. Returns how many objects were visited.
pub fn release_all() -> usize {
    REGISTRY.release_all()
}

/// Register [`release_all`] to run when the process exits normally.
///
/// Safe to call more than once; the hook is installed a single time.
/// Returns `false` on platforms without `atexit` support.
pub fn install_exit_hook() -> bool {
    static INSTALL: Once = Once::new();

    #[cfg(unix)]
    {
        INSTALL.call_once(|| {
            // SAFETY: `run_exit_hook` is a plain `extern "C"` fn that never unwinds.
            let rc = unsafe { libc::atexit(run_exit_hook) };
            if rc != 0 {
                warn!("failed to install lock exit hook");
            }
        });
        true
    }

    #[cfg(not(unix))]
    {
        INSTALL.call_once(|| debug!("exit hook not supported on this platform"));
        false
    }
}

#[cfg(unix)]
extern "C" fn run_exit_hook() {
    let _ = std::panic::catch_unwind(release_all);
}

/// Calls [`release_all`] when dropped.
///
/// Keep one alive for the lifetime of `main` so an early return or panic
/// still clears this process's claims.
#[derive(Debug)]
#[must_use = "locks are released when the guard is dropped"]
pub struct ShutdownGuard {
    _private: (),
}

/// Create a [`ShutdownGuard`].
pub fn shutdown_guard() -> ShutdownGuard {
    ShutdownGuard { _private: () }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        release_all();
    }
}
