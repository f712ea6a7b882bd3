//! Scoped acquisition: take a lock, run something, always release.

use super::mutex::Lockfile;
use super::rwlock::RwLockfile;
use super::types::{AcquireOptions, LockType};
use crate::error::{LockfileError, Result};
use std::future::Future;
use std::path::Path;
use tracing::warn;

/// A lock object a guard can hold.
#[derive(Debug, Clone)]
pub enum LockHandle {
    Mutex(Lockfile),
    RwLock(RwLockfile),
}

impl From<Lockfile> for LockHandle {
    fn from(lock: Lockfile) -> Self {
        LockHandle::Mutex(lock)
    }
}

impl From<RwLockfile> for LockHandle {
    fn from(lock: RwLockfile) -> Self {
        LockHandle::RwLock(lock)
    }
}

impl LockHandle {
    /// The on-disk path the lock lives at.
    pub fn path(&self) -> &Path {
        match self {
            LockHandle::Mutex(lock) => lock.path(),
            LockHandle::RwLock(lock) => lock.path(),
        }
    }

    /// A mutex takes no mode; a read/write lock needs one.
    fn validate(&self, mode: Option<LockType>) -> Result<()> {
        match (self, mode) {
            (LockHandle::Mutex(_), None) | (LockHandle::RwLock(_), Some(_)) => Ok(()),
            (LockHandle::Mutex(lock), Some(mode)) => Err(LockfileError::InvalidTarget(format!(
                "{} is a mutex and cannot be locked in {} mode",
                lock.path().display(),
                mode
            ))),
            (LockHandle::RwLock(lock), None) => Err(LockfileError::InvalidTarget(format!(
                "{} is a read/write lock and needs a read or write mode",
                lock.path().display()
            ))),
        }
    }

    async fn add(&self, mode: Option<LockType>, opts: AcquireOptions) -> Result<()> {
        match (self, mode) {
            (LockHandle::Mutex(lock), _) => lock.add(opts).await,
            (LockHandle::RwLock(lock), Some(mode)) => lock.add(mode, opts).await,
            (LockHandle::RwLock(_), None) => self.validate(mode),
        }
    }

    fn add_sync(&self, mode: Option<LockType>, opts: AcquireOptions) -> Result<()> {
        match (self, mode) {
            (LockHandle::Mutex(lock), _) => lock.add_sync(opts),
            (LockHandle::RwLock(lock), Some(mode)) => lock.add_sync(mode, opts),
            (LockHandle::RwLock(_), None) => self.validate(mode),
        }
    }

    async fn remove(&self, mode: Option<LockType>) -> Result<()> {
        match (self, mode) {
            (LockHandle::Mutex(lock), _) => lock.remove().await,
            (LockHandle::RwLock(lock), Some(mode)) => lock.remove(mode).await,
            (LockHandle::RwLock(_), None) => Ok(()),
        }
    }

    fn remove_sync(&self, mode: Option<LockType>) -> Result<()> {
        match (self, mode) {
            (LockHandle::Mutex(lock), _) => lock.remove_sync(),
            (LockHandle::RwLock(lock), Some(mode)) => lock.remove_sync(mode),
            (LockHandle::RwLock(_), None) => Ok(()),
        }
    }

    /// Release from a destructor. A mutex never waits on other tasks, so it
    /// releases in place; a read/write lock may, so it is detached.
    fn remove_on_drop(&self, mode: Option<LockType>) -> Result<()> {
        match (self, mode) {
            (LockHandle::Mutex(lock), _) => lock.remove_sync(),
            (LockHandle::RwLock(lock), Some(mode)) => lock.remove_detached(mode),
            (LockHandle::RwLock(_), None) => Ok(()),
        }
    }
}

/// Holds one reference on a lock until released or dropped.
///
/// When dropped, a mutex reference is released synchronously. A read/write
/// reference is counted down at once, but inside a tokio runtime its state
/// file entry is removed by a spawned task, so the file may lag the drop
/// briefly. Failures are logged; dropping never panics.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    handle: LockHandle,
    mode: Option<LockType>,
    released: bool,
}

impl LockGuard {
    /// Acquire one reference on `handle`.
    pub async fn acquire(
        handle: LockHandle,
        mode: Option<LockType>,
        opts: AcquireOptions,
    ) -> Result<Self> {
        handle.validate(mode)?;
        handle.add(mode, opts).await?;
        Ok(Self::new(handle, mode))
    }

    /// Blocking twin of [`acquire`](Self::acquire).
    pub fn acquire_sync(
        handle: LockHandle,
        mode: Option<LockType>,
        opts: AcquireOptions,
    ) -> Result<Self> {
        handle.validate(mode)?;
        handle.add_sync(mode, opts)?;
        Ok(Self::new(handle, mode))
    }

    fn new(handle: LockHandle, mode: Option<LockType>) -> Self {
        Self {
            handle,
            mode,
            released: false,
        }
    }

    pub fn handle(&self) -> &LockHandle {
        &self.handle
    }

    pub fn mode(&self) -> Option<LockType> {
        self.mode
    }

    /// Release now and report failure instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.handle.remove_sync(self.mode)
    }

    /// Async twin of [`release`](Self::release).
    pub async fn release_async(mut self) -> Result<()> {
        // The count drops on the first poll, so a cancelled release must not
        // count down again in `drop`.
        self.released = true;
        self.handle.remove(self.mode).await
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.handle.remove_on_drop(self.mode)
        {
            warn!(
                path = %self.handle.path().display(),
                error = %e,
                "failed to release lock"
            );
        }
    }
}

/// Run `f` while holding one reference on `handle`.
///
/// The reference is released on every exit path. If `f` fails, its error is
/// returned and a release failure is only logged. If the returned future is
/// dropped early, the guard's drop releases the reference (see [`LockGuard`]).
pub async fn with_lock<T, E, F, Fut>(
    handle: &LockHandle,
    mode: Option<LockType>,
    opts: AcquireOptions,
    f: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<LockfileError>,
{
    let guard = LockGuard::acquire(handle.clone(), mode, opts).await?;
    let result = f().await;
    finish(result, guard.release_async().await, handle)
}

/// Blocking twin of [`with_lock`].
pub fn with_lock_sync<T, E, F>(
    handle: &LockHandle,
    mode: Option<LockType>,
    opts: AcquireOptions,
    f: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<LockfileError>,
{
    let guard = LockGuard::acquire_sync(handle.clone(), mode, opts)?;
    let result = f();
    finish(result, guard.release(), handle)
}

fn finish<T, E>(
    result: std::result::Result<T, E>,
    released: Result<()>,
    handle: &LockHandle,
) -> std::result::Result<T, E>
where
    E: From<LockfileError>,
{
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(e)) => {
            warn!(path = %handle.path().display(), error = %e, "failed to release lock");
            Err(err)
        }
    }
}
