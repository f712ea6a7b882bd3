//! Read/write lock layered on a private [`Lockfile`].
//!
//! Ownership lives in a JSON document at `<base>.lock` (see [`LockFileState`]).
//! Every read-modify-write of that document happens inside one critical
//! section guarded by a `Lockfile` on the document itself, whose claim
//! directory is therefore `<base>.lock.lock`.
//!
//! Entries left behind by dead processes are pruned whenever they block a
//! request. Within one object, a single-permit gate keeps read and write
//! critical sections from interleaving, and concurrent acquisitions of the
//! same kind share one attempt. Reference counts follow the same rules as
//! [`Lockfile`]: the last `remove` marks the entry as releasing before the
//! state file is touched, and an `add` arriving meanwhile waits for it.

use super::backoff::{Backoff, jitter};
use super::mutex::Lockfile;
use super::state::{self, Job, LockFileState};
use super::types::{AcquireOptions, IfLocked, LockCounts, LockStatus, LockType};
use crate::config::LockConfig;
use crate::error::{LockfileError, Result};
use crate::fs;
use crate::liveness::{ProcessLiveness, SystemLiveness};
use crate::registry::{self, Releasable};
use crate::single_flight::SingleFlight;
use futures::future::join_all;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore, SemaphorePermit, TryAcquireError};
use tracing::{debug, warn};
use uuid::Uuid;

/// Retry interval used when neither the config nor the call sets one.
pub const DEFAULT_RW_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// A cross-process read/write lock on `<base>.lock`.
///
/// Clones share the same entries and counts.
#[derive(Clone)]
pub struct RwLockfile {
    inner: Arc<Inner>,
}

struct Inner {
    core: Arc<Core>,
    acquiring: SingleFlight<LockType, Result<()>>,
    checking: SingleFlight<LockType, Result<LockStatus>>,
}

struct Core {
    base: PathBuf,
    path: PathBuf,
    uuid: String,
    config: LockConfig,
    liveness: Arc<dyn ProcessLiveness>,
    if_locked: Option<IfLocked>,
    internal: Lockfile,
    gate: Semaphore,
    held: Mutex<Held>,
    idle: Condvar,
    released: Notify,
}

/// Ownership of one kind. `count > 0` implies `registered` and no release is
/// running.
#[derive(Debug, Default, Clone, Copy)]
struct Entry {
    count: usize,
    /// This object's entry is in the state file.
    registered: bool,
    releasing: bool,
}

#[derive(Debug, Default)]
struct Held {
    read: Entry,
    write: Entry,
}

impl Held {
    fn entry(&mut self, kind: LockType) -> &mut Entry {
        match kind {
            LockType::Read => &mut self.read,
            LockType::Write => &mut self.write,
        }
    }
}

/// What a caller has to do after a count transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done,
    Acquire,
    Release,
    /// Another caller is removing the entry.
    Wait,
}

/// Builder for [`RwLockfile`].
pub struct RwLockfileBuilder {
    base: PathBuf,
    config: LockConfig,
    liveness: Option<Arc<dyn ProcessLiveness>>,
    if_locked: Option<IfLocked>,
}

impl RwLockfileBuilder {
    pub fn config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `liveness` to decide whether entry owners are still running.
    pub fn liveness(mut self, liveness: impl ProcessLiveness + 'static) -> Self {
        self.liveness = Some(Arc::new(liveness));
        self
    }

    /// Callback used by acquisitions that do not pass their own.
    pub fn if_locked<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.if_locked = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> RwLockfile {
        let path = fs::lock_path(&self.base, ".lock");
        let internal = Lockfile::with_config(&path, self.config.clone());
        let core = Arc::new(Core {
            base: self.base,
            path,
            uuid: Uuid::new_v4().to_string(),
            config: self.config,
            liveness: self.liveness.unwrap_or_else(|| Arc::new(SystemLiveness)),
            if_locked: self.if_locked,
            internal,
            gate: Semaphore::new(1),
            held: Mutex::new(Held::default()),
            idle: Condvar::new(),
            released: Notify::new(),
        });

        let weak: Weak<dyn Releasable> = Arc::downgrade(&core) as Weak<dyn Releasable>;
        registry::register(weak);

        RwLockfile {
            inner: Arc::new(Inner {
                core,
                acquiring: SingleFlight::new(),
                checking: SingleFlight::new(),
            }),
        }
    }
}

impl RwLockfile {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self::builder(base).build()
    }

    pub fn with_config(base: impl AsRef<Path>, config: LockConfig) -> Self {
        Self::builder(base).config(config).build()
    }

    pub fn builder(base: impl AsRef<Path>) -> RwLockfileBuilder {
        RwLockfileBuilder {
            base: base.as_ref().to_path_buf(),
            config: LockConfig::default(),
            liveness: None,
            if_locked: None,
        }
    }

    pub fn base(&self) -> &Path {
        &self.inner.core.base
    }

    /// The state file, `<base>.lock`.
    pub fn path(&self) -> &Path {
        &self.inner.core.path
    }

    /// The private mutex guarding the state file.
    pub fn internal(&self) -> &Lockfile {
        &self.inner.core.internal
    }

    pub fn uuid(&self) -> &str {
        &self.inner.core.uuid
    }

    pub fn config(&self) -> &LockConfig {
        &self.inner.core.config
    }

    pub fn count(&self) -> LockCounts {
        self.inner.core.counts()
    }

    /// Take one `kind` reference, registering an entry if this object has none.
    pub async fn add(&self, kind: LockType, opts: AcquireOptions) -> Result<()> {
        let core = &self.inner.core;
        debug!(path = %core.path.display(), kind = %kind, counts = ?self.count(), reason = ?opts.reason, "add");

        loop {
            match core.take_reference(kind) {
                Step::Acquire => {
                    let acquiring = Arc::clone(core);
                    let opts = opts.clone();
                    self.inner
                        .acquiring
                        .run(kind, move || async move { acquiring.acquire(kind, opts).await })
                        .await?;
                }
                Step::Wait => core.release_finished(kind).await,
                Step::Done | Step::Release => return Ok(()),
            }
        }
    }

    /// Blocking twin of [`add`](Self::add), bounded by `sync_retries`.
    pub fn add_sync(&self, kind: LockType, opts: AcquireOptions) -> Result<()> {
        let core = &self.inner.core;
        debug!(path = %core.path.display(), kind = %kind, counts = ?self.count(), reason = ?opts.reason, "add_sync");

        loop {
            match core.take_reference(kind) {
                Step::Acquire => core.acquire_sync(kind, &opts)?,
                Step::Wait => core.release_finished_sync(kind)?,
                Step::Done | Step::Release => return Ok(()),
            }
        }
    }

    /// Drop one `kind` reference, removing the entry when it was the last.
    pub async fn remove(&self, kind: LockType) -> Result<()> {
        let core = &self.inner.core;
        let step = core.drop_reference(kind);
        debug!(path = %core.path.display(), kind = %kind, counts = ?self.count(), ?step, "remove");
        match step {
            Step::Release => core.release(kind).await,
            _ => Ok(()),
        }
    }

    pub fn remove_sync(&self, kind: LockType) -> Result<()> {
        let core = &self.inner.core;
        let step = core.drop_reference(kind);
        debug!(path = %core.path.display(), kind = %kind, counts = ?self.count(), ?step, "remove_sync");
        match step {
            Step::Release => core.release_sync(kind),
            _ => Ok(()),
        }
    }

    /// Drop one `kind` reference without blocking the calling thread.
    ///
    /// The count changes immediately. Inside a tokio runtime the state file is
    /// updated by a spawned task and failures are logged; elsewhere this is
    /// [`remove_sync`](Self::remove_sync).
    pub fn remove_detached(&self, kind: LockType) -> Result<()> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return self.remove_sync(kind);
        };
        let core = &self.inner.core;
        let step = core.drop_reference(kind);
        debug!(path = %core.path.display(), kind = %kind, counts = ?self.count(), ?step, "remove_detached");
        if step == Step::Release {
            let core = Arc::clone(core);
            runtime.spawn(async move {
                if let Err(e) = core.release(kind).await {
                    warn!(path = %core.path.display(), kind = %kind, error = %e, "failed to release lock");
                }
            });
        }
        Ok(())
    }

    /// Remove this object's `kind` entry regardless of the count.
    ///
    /// A caller that finds a removal already running waits for it instead.
    pub async fn remove_all(&self, kind: LockType) -> Result<()> {
        let core = &self.inner.core;
        match core.begin_unlock(kind) {
            Step::Release => core.release(kind).await,
            Step::Wait => {
                core.release_finished(kind).await;
                Ok(())
            }
            Step::Done | Step::Acquire => Ok(()),
        }
    }

    pub fn remove_all_sync(&self, kind: LockType) -> Result<()> {
        self.inner.core.remove_all_sync(kind)
    }

    /// Remove both of this object's entries.
    pub async fn unlock(&self) -> Result<()> {
        for kind in LockType::ALL {
            self.remove_all(kind).await?;
        }
        Ok(())
    }

    pub fn unlock_sync(&self) -> Result<()> {
        self.inner.core.unlock_sync()
    }

    /// What currently blocks a `kind` request from this object.
    ///
    /// Entries of dead processes are pruned before answering.
    pub async fn check(&self, kind: LockType) -> Result<LockStatus> {
        let core = Arc::clone(&self.inner.core);
        self.inner
            .checking
            .run(kind, move || async move {
                core.critical(format!("check:{}", kind), core.config.timeout(), || {
                    core.status(kind)
                })
                .await
            })
            .await
    }

    pub fn check_sync(&self, kind: LockType) -> Result<LockStatus> {
        let core = &self.inner.core;
        core.critical_sync(format!("check_sync:{}", kind), || core.status_sync(kind))
    }

    /// The state document as it is on disk, without pruning.
    pub async fn state(&self) -> Result<LockFileState> {
        state::fetch(&self.inner.core.path).await
    }

    pub fn state_sync(&self) -> Result<LockFileState> {
        state::fetch_sync(&self.inner.core.path)
    }
}

impl std::fmt::Debug for RwLockfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLockfile")
            .field("path", &self.inner.core.path)
            .field("uuid", &self.inner.core.uuid)
            .field("count", &self.count())
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.core.holds()
            && let Err(e) = self.core.unlock_sync()
        {
            warn!(path = %self.core.path.display(), error = %e, "failed to release lock on drop");
        }
    }
}

impl Core {
    fn held(&self) -> MutexGuard<'_, Held> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn counts(&self) -> LockCounts {
        let held = self.held();
        LockCounts {
            read: held.read.count,
            write: held.write.count,
        }
    }

    fn holds(&self) -> bool {
        let held = self.held();
        [held.read, held.write]
            .iter()
            .any(|entry| entry.count > 0 || entry.registered)
    }

    /// Count one more `kind` reference if the entry is registered and not
    /// being removed.
    fn take_reference(&self, kind: LockType) -> Step {
        let mut held = self.held();
        let entry = held.entry(kind);
        if entry.releasing {
            Step::Wait
        } else if entry.registered {
            entry.count += 1;
            Step::Done
        } else {
            Step::Acquire
        }
    }

    /// Count one `kind` reference less, marking the entry as releasing on the
    /// last.
    fn drop_reference(&self, kind: LockType) -> Step {
        let mut held = self.held();
        let entry = held.entry(kind);
        match entry.count {
            0 => Step::Done,
            1 => {
                entry.count = 0;
                entry.releasing = true;
                Step::Release
            }
            _ => {
                entry.count -= 1;
                Step::Done
            }
        }
    }

    fn begin_unlock(&self, kind: LockType) -> Step {
        let mut held = self.held();
        let entry = held.entry(kind);
        if entry.releasing {
            return Step::Wait;
        }
        entry.count = 0;
        if !entry.registered {
            return Step::Done;
        }
        entry.releasing = true;
        Step::Release
    }

    fn mark_registered(&self, kind: LockType) {
        self.held().entry(kind).registered = true;
    }

    /// Leave the releasing state and wake waiters. A failed removal keeps the
    /// entry registered with a count of zero.
    fn finish_release(&self, kind: LockType, removed: bool) {
        {
            let mut held = self.held();
            let entry = held.entry(kind);
            entry.releasing = false;
            if removed {
                entry.registered = false;
            }
        }
        self.idle.notify_all();
        self.released.notify_waiters();
    }

    /// Wait until no `kind` removal is running on this object.
    async fn release_finished(&self, kind: LockType) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let releasing = self.held().entry(kind).releasing;
            if !releasing {
                return;
            }
            notified.await;
        }
    }

    /// Blocking twin of `release_finished`, bounded by the configured timeout.
    fn release_finished_sync(&self, kind: LockType) -> Result<()> {
        let held = self.held();
        let (_held, waited) = self
            .idle
            .wait_timeout_while(held, self.config.timeout(), |held| held.entry(kind).releasing)
            .unwrap_or_else(PoisonError::into_inner);
        if waited.timed_out() {
            return Err(LockfileError::Locked {
                path: self.path.clone(),
                reason: Some("release in progress in this process".to_string()),
            });
        }
        Ok(())
    }

    fn timing(&self, opts: &AcquireOptions) -> (Duration, Duration) {
        let timeout = opts.timeout.unwrap_or_else(|| self.config.timeout());
        let interval = opts
            .retry_interval
            .unwrap_or_else(|| self.config.retry_interval_or(DEFAULT_RW_RETRY_INTERVAL));
        (timeout, interval)
    }

    fn if_locked<'a>(&'a self, opts: &'a AcquireOptions) -> Option<&'a IfLocked> {
        opts.if_locked.as_ref().or(self.if_locked.as_ref())
    }

    /// Run `f` holding the object gate and the private mutex.
    ///
    /// Waiting for the private mutex spends at most `timeout`. The mutex is
    /// released even when `f` fails; `f`'s error wins.
    async fn critical<T, F, Fut>(&self, reason: String, timeout: Duration, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| io::Error::other(e.to_string()))?;
        self.internal
            .add(AcquireOptions::new().reason(reason).timeout(timeout))
            .await?;
        let mut section = CriticalSection {
            internal: &self.internal,
            armed: true,
        };
        let result = f().await;
        section.armed = false;
        let released = self.internal.remove().await;
        let value = result?;
        released?;
        Ok(value)
    }

    fn critical_sync<T>(&self, reason: String, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _permit = self.gate_sync()?;
        self.internal
            .add_sync(AcquireOptions::new().reason(reason))?;
        let result = f();
        let released = self.internal.remove_sync();
        let value = result?;
        released?;
        Ok(value)
    }

    /// Take the object gate without a runtime, spinning up to `sync_retries` times.
    fn gate_sync(&self) -> Result<SemaphorePermit<'_>> {
        let pause = self.config.retry_interval_or(DEFAULT_RW_RETRY_INTERVAL);
        for _ in 0..=self.config.sync_retries {
            match self.gate.try_acquire() {
                Ok(permit) => return Ok(permit),
                Err(TryAcquireError::NoPermits) => std::thread::sleep(jitter(pause)),
                Err(TryAcquireError::Closed) => break,
            }
        }
        Err(LockfileError::Locked {
            path: self.internal.path().to_path_buf(),
            reason: Some("busy in this process".to_string()),
        })
    }

    /// Status for `kind`, pruning dead owners until nothing more can be pruned.
    async fn status(&self, kind: LockType) -> Result<LockStatus> {
        loop {
            let mut current = state::fetch(&self.path).await?;
            let status = current.status(kind, &self.uuid);
            let blocking = blocking_jobs(&status);
            if blocking.is_empty() {
                return Ok(status);
            }

            let dead = self.dead_jobs(blocking).await;
            if dead.is_empty() {
                return Ok(status);
            }
            let pruned = current.prune(&dead);
            debug!(path = %self.path.display(), pruned, "pruned entries of dead processes");
            state::store(&self.path, &current).await?;
        }
    }

    fn status_sync(&self, kind: LockType) -> Result<LockStatus> {
        loop {
            let mut current = state::fetch_sync(&self.path)?;
            let status = current.status(kind, &self.uuid);
            let dead: Vec<Job> = blocking_jobs(&status)
                .into_iter()
                .filter(|job| job.is_local() && !self.liveness.is_alive(job.pid))
                .collect();
            if dead.is_empty() {
                return Ok(status);
            }
            let pruned = current.prune(&dead);
            debug!(path = %self.path.display(), pruned, "pruned entries of dead processes");
            state::store_sync(&self.path, &current)?;
        }
    }

    /// Probe the owners of `jobs` concurrently and return the dead ones.
    async fn dead_jobs(&self, jobs: Vec<Job>) -> Vec<Job> {
        let probes = jobs.into_iter().filter(Job::is_local).map(|job| {
            let liveness = Arc::clone(&self.liveness);
            tokio::task::spawn_blocking(move || (!liveness.is_alive(job.pid)).then_some(job))
        });

        join_all(probes)
            .await
            .into_iter()
            .filter_map(|probe| probe.ok().flatten())
            .collect()
    }

    async fn try_lock(
        &self,
        kind: LockType,
        reason: Option<&str>,
        timeout: Duration,
    ) -> Result<()> {
        self.critical(format!("add:{}", kind), timeout, || async move {
            let status = self.status(kind).await?;
            self.conflict(kind, status)?;
            let mut current = state::fetch(&self.path).await?;
            current.add_job(kind, Job::new(&self.uuid, reason));
            state::store(&self.path, &current).await?;
            self.mark_registered(kind);
            Ok(())
        })
        .await
    }

    fn try_lock_sync(&self, kind: LockType, reason: Option<&str>) -> Result<()> {
        self.critical_sync(format!("add_sync:{}", kind), || {
            let status = self.status_sync(kind)?;
            self.conflict(kind, status)?;
            let mut current = state::fetch_sync(&self.path)?;
            current.add_job(kind, Job::new(&self.uuid, reason));
            state::store_sync(&self.path, &current)?;
            self.mark_registered(kind);
            Ok(())
        })
    }

    /// Turn a non-open status into the error a `kind` request should fail with.
    fn conflict(&self, kind: LockType, status: LockStatus) -> Result<()> {
        match (kind, status) {
            (_, LockStatus::Open) => Ok(()),
            (_, LockStatus::WriteLock { job }) => Err(LockfileError::LockExists {
                kind: LockType::Write,
                path: self.path.clone(),
                reason: job.reason,
            }),
            (LockType::Write, LockStatus::ReadLock { jobs }) => Err(LockfileError::LockExists {
                kind: LockType::Read,
                path: self.path.clone(),
                reason: jobs.into_iter().find_map(|j| j.reason),
            }),
            (LockType::Read, LockStatus::ReadLock { .. }) => Err(LockfileError::UnexpectedStatus(
                "read_lock reported for a read request".to_string(),
            )),
        }
    }

    async fn acquire(&self, kind: LockType, opts: AcquireOptions) -> Result<()> {
        let (timeout, interval) = self.timing(&opts);
        let deadline = Instant::now().checked_add(timeout);
        let mut backoff = Backoff::new(timeout, interval);
        let mut notified = false;

        loop {
            let remaining =
                deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
            let err = match self
                .try_lock(kind, opts.reason.as_deref(), remaining)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_timeout() => e,
                Err(e) => return Err(e),
            };

            // A busy state file is retried silently; only real conflicts are reported.
            if !notified && matches!(err, LockfileError::LockExists { .. }) {
                notified = true;
                if let Some(if_locked) = self.if_locked(&opts) {
                    if_locked(err.conflicting_reason());
                }
            }
            // The budget covers waits for the state file as well as the pauses.
            if backoff.exhausted() || deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(err);
            }
            let delay = backoff.next_delay();
            debug!(path = %self.path.display(), kind = %kind, error = %err, ?delay, "waiting for lock");
            tokio::time::sleep(delay).await;
        }
    }

    fn acquire_sync(&self, kind: LockType, opts: &AcquireOptions) -> Result<()> {
        let (_, interval) = self.timing(opts);
        let mut retries = self.config.sync_retries;
        let mut notified = false;

        loop {
            let err = match self.try_lock_sync(kind, opts.reason.as_deref()) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_timeout() => e,
                Err(e) => return Err(e),
            };

            // A busy state file is retried silently; only real conflicts are reported.
            if !notified && matches!(err, LockfileError::LockExists { .. }) {
                notified = true;
                if let Some(if_locked) = self.if_locked(opts) {
                    if_locked(err.conflicting_reason());
                }
            }
            if retries == 0 {
                return Err(err);
            }
            retries -= 1;
            debug!(path = %self.path.display(), kind = %kind, error = %err, retries, "waiting for lock");
            std::thread::sleep(jitter(interval));
        }
    }

    /// Remove this object's `kind` entry. The caller has already marked it
    /// as releasing.
    ///
    /// Finishes synchronously if the future is dropped part way.
    async fn release(&self, kind: LockType) -> Result<()> {
        debug!(path = %self.path.display(), kind = %kind, "remove_all");
        let mut pending = PendingRelease {
            core: self,
            kind,
            armed: true,
        };
        let result = self
            .critical(format!("remove:{}", kind), self.config.timeout(), || async move {
                let mut current = state::fetch(&self.path).await?;
                if current.remove_owned(kind, &self.uuid) {
                    state::store(&self.path, &current).await?;
                }
                Ok(())
            })
            .await;
        pending.armed = false;
        self.finish_release(kind, result.is_ok());
        result
    }

    fn release_sync(&self, kind: LockType) -> Result<()> {
        debug!(path = %self.path.display(), kind = %kind, "remove_all_sync");
        let result = self.critical_sync(format!("remove_sync:{}", kind), || {
            let mut current = state::fetch_sync(&self.path)?;
            if current.remove_owned(kind, &self.uuid) {
                state::store_sync(&self.path, &current)?;
            }
            Ok(())
        });
        self.finish_release(kind, result.is_ok());
        result
    }

    fn remove_all_sync(&self, kind: LockType) -> Result<()> {
        match self.begin_unlock(kind) {
            Step::Release => self.release_sync(kind),
            Step::Wait => self.release_finished_sync(kind),
            Step::Done | Step::Acquire => Ok(()),
        }
    }

    fn unlock_sync(&self) -> Result<()> {
        for kind in LockType::ALL {
            self.remove_all_sync(kind)?;
        }
        Ok(())
    }
}

/// Gives the private mutex back if a critical section is dropped part way.
struct CriticalSection<'a> {
    internal: &'a Lockfile,
    armed: bool,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        if self.armed
            && let Err(e) = self.internal.remove_sync()
        {
            warn!(path = %self.internal.path().display(), error = %e, "failed to leave cancelled critical section");
        }
    }
}

/// Completes a removal whose future was dropped before it finished.
struct PendingRelease<'a> {
    core: &'a Core,
    kind: LockType,
    armed: bool,
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.core.release_sync(self.kind) {
            warn!(path = %self.core.path.display(), kind = %self.kind, error = %e, "failed to finish cancelled release");
        }
    }
}

impl Releasable for Core {
    fn force_release_sync(&self) -> Result<()> {
        self.unlock_sync()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn blocking_jobs(status: &LockStatus) -> Vec<Job> {
    match status {
        LockStatus::Open => Vec::new(),
        LockStatus::WriteLock { job } => vec![job.clone()],
        LockStatus::ReadLock { jobs } => jobs.clone(),
    }
}
