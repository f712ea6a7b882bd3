//! Exclusive cross-process lock backed by a claim directory.
//!
//! Holding the lock means owning `<base>.lock`, a directory created with an
//! exclusive `mkdir`. Owner details go to `<base>.lock.info.json`. While held,
//! a heartbeat keeps the directory's mtime fresh; a claim whose mtime is older
//! than the stale threshold is presumed abandoned and may be removed by anyone.
//!
//! A `Lockfile` is reference counted: the claim is created on the first `add`
//! and removed when the matching last `remove` (or any `unlock`) runs. Count
//! changes are decided under one lock. A release marks the object as releasing
//! before it touches the filesystem, and `add` waits for it to finish and then
//! claims afresh.

use super::backoff::{Backoff, jitter};
use super::heartbeat::Heartbeat;
use super::metadata::MutexInfo;
use super::types::{AcquireOptions, ClaimInfo};
use crate::config::LockConfig;
use crate::error::{LockfileError, Result};
use crate::fs;
use crate::registry::{self, Releasable};
use crate::single_flight::SingleFlight;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

/// Retry interval used when neither the config nor the call sets one.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// An exclusive lock on `<base>.lock`.
///
/// Clones share the same claim and count.
#[derive(Clone)]
pub struct Lockfile {
    inner: Arc<Inner>,
}

struct Inner {
    core: Arc<Core>,
    acquiring: SingleFlight<(), Result<()>>,
    checking: SingleFlight<(), Result<bool>>,
}

struct Core {
    base: PathBuf,
    path: PathBuf,
    info_path: PathBuf,
    uuid: String,
    config: LockConfig,
    held: Mutex<Held>,
    idle: Condvar,
    released: Notify,
}

/// Ownership of one object. `count > 0` implies `claim` is set and no release
/// is running.
#[derive(Default)]
struct Held {
    count: usize,
    /// Present while this object owns the claim directory.
    claim: Option<Heartbeat>,
    releasing: bool,
}

/// What a caller has to do after a count transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done,
    Acquire,
    Release,
    /// Another caller is releasing the claim.
    Wait,
}

impl Lockfile {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self::with_config(base, LockConfig::default())
    }

    pub fn with_config(base: impl AsRef<Path>, config: LockConfig) -> Self {
        let base = base.as_ref().to_path_buf();
        let path = fs::lock_path(&base, ".lock");
        let info_path = fs::lock_path(&base, ".lock.info.json");
        let core = Arc::new(Core {
            base,
            path,
            info_path,
            uuid: Uuid::new_v4().to_string(),
            config,
            held: Mutex::new(Held::default()),
            idle: Condvar::new(),
            released: Notify::new(),
        });

        let weak: Weak<dyn Releasable> = Arc::downgrade(&core) as Weak<dyn Releasable>;
        registry::register(weak);

        Self {
            inner: Arc::new(Inner {
                core,
                acquiring: SingleFlight::new(),
                checking: SingleFlight::new(),
            }),
        }
    }

    /// The path this lock was created for.
    pub fn base(&self) -> &Path {
        &self.inner.core.base
    }

    /// The claim directory, `<base>.lock`.
    pub fn path(&self) -> &Path {
        &self.inner.core.path
    }

    /// The owner info file, `<base>.lock.info.json`.
    pub fn info_path(&self) -> &Path {
        &self.inner.core.info_path
    }

    pub fn uuid(&self) -> &str {
        &self.inner.core.uuid
    }

    pub fn config(&self) -> &LockConfig {
        &self.inner.core.config
    }

    /// Number of outstanding `add` calls.
    pub fn count(&self) -> usize {
        self.inner.core.held().count
    }

    /// Take one reference, acquiring the claim if this object holds none.
    ///
    /// Concurrent callers on the same object share a single acquisition.
    pub async fn add(&self, opts: AcquireOptions) -> Result<()> {
        let core = &self.inner.core;
        debug!(path = %core.path.display(), count = core.held().count, reason = ?opts.reason, "add");

        loop {
            match core.take_reference() {
                Step::Acquire => {
                    let acquiring = Arc::clone(core);
                    let opts = opts.clone();
                    self.inner
                        .acquiring
                        .call(move || async move { acquiring.acquire(opts).await })
                        .await?;
                }
                Step::Wait => core.release_finished().await,
                Step::Done | Step::Release => return Ok(()),
            }
        }
    }

    /// Blocking twin of [`add`](Self::add).
    ///
    /// Retries up to `sync_retries` times with a short pause instead of
    /// spending a time budget.
    pub fn add_sync(&self, opts: AcquireOptions) -> Result<()> {
        let core = &self.inner.core;
        debug!(path = %core.path.display(), count = core.held().count, reason = ?opts.reason, "add_sync");

        loop {
            match core.take_reference() {
                Step::Acquire => core.acquire_sync(&opts)?,
                Step::Wait => core.release_finished_sync()?,
                Step::Done | Step::Release => return Ok(()),
            }
        }
    }

    /// Same as `add` with default options.
    pub async fn lock(&self) -> Result<()> {
        self.add(AcquireOptions::default()).await
    }

    pub fn lock_sync(&self) -> Result<()> {
        self.add_sync(AcquireOptions::default())
    }

    /// Drop one reference, releasing the claim when it was the last.
    pub async fn remove(&self) -> Result<()> {
        let core = &self.inner.core;
        let step = core.drop_reference();
        debug!(path = %core.path.display(), count = core.held().count, ?step, "remove");
        match step {
            Step::Release => core.release().await,
            _ => Ok(()),
        }
    }

    pub fn remove_sync(&self) -> Result<()> {
        let core = &self.inner.core;
        let step = core.drop_reference();
        debug!(path = %core.path.display(), count = core.held().count, ?step, "remove_sync");
        match step {
            Step::Release => core.release_sync(),
            _ => Ok(()),
        }
    }

    /// Release the claim regardless of the count.
    ///
    /// Does nothing if this object does not hold the claim. A caller that finds
    /// a release already running waits for it instead of starting another.
    pub async fn unlock(&self) -> Result<()> {
        let core = &self.inner.core;
        match core.begin_unlock() {
            Step::Release => core.release().await,
            Step::Wait => {
                core.release_finished().await;
                Ok(())
            }
            Step::Done | Step::Acquire => Ok(()),
        }
    }

    pub fn unlock_sync(&self) -> Result<()> {
        self.inner.core.unlock_sync()
    }

    /// Whether this object could take the lock right now.
    ///
    /// True if it already holds it, if nobody does, or if the existing claim is
    /// stale (the stale claim is removed on the way).
    pub async fn check(&self) -> Result<bool> {
        if self.inner.core.holds() {
            return Ok(true);
        }
        let core = Arc::clone(&self.inner.core);
        self.inner
            .checking
            .call(move || async move { core.clear_if_stale().await })
            .await
    }

    pub fn check_sync(&self) -> Result<bool> {
        if self.inner.core.holds() {
            return Ok(true);
        }
        self.inner.core.clear_if_stale_sync()
    }

    /// The current claim on disk, whoever holds it. `None` when unclaimed.
    pub async fn info(&self) -> Result<Option<ClaimInfo>> {
        let core = &self.inner.core;
        let Some(modified) = fs::mtime(&core.path).await? else {
            return Ok(None);
        };
        let info = fs::read_json(&core.info_path).await.unwrap_or_else(|e| {
            debug!(path = %core.info_path.display(), error = %e, "unreadable owner info");
            None
        });
        Ok(Some(core.claim_info(modified, info)))
    }

    pub fn info_sync(&self) -> Result<Option<ClaimInfo>> {
        let core = &self.inner.core;
        let Some(modified) = fs::mtime_sync(&core.path)? else {
            return Ok(None);
        };
        let info = fs::read_json_sync(&core.info_path).unwrap_or_else(|e| {
            debug!(path = %core.info_path.display(), error = %e, "unreadable owner info");
            None
        });
        Ok(Some(core.claim_info(modified, info)))
    }
}

impl std::fmt::Debug for Lockfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lockfile")
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

    fn holds(&self) -> bool {
        let held = self.held();
        held.count > 0 || held.claim.is_some()
    }

    /// Count one more reference if the claim is ours and not being released.
    fn take_reference(&self) -> Step {
        let mut held = self.held();
        if held.releasing {
            Step::Wait
        } else if held.claim.is_some() {
            held.count += 1;
            Step::Done
        } else {
            Step::Acquire
        }
    }

    /// Count one reference less, marking the claim as releasing on the last.
    fn drop_reference(&self) -> Step {
        let mut held = self.held();
        match held.count {
            0 => Step::Done,
            1 => {
                held.count = 0;
                held.releasing = true;
                Step::Release
            }
            _ => {
                held.count -= 1;
                Step::Done
            }
        }
    }

    fn begin_unlock(&self) -> Step {
        let mut held = self.held();
        if held.releasing {
            return Step::Wait;
        }
        held.count = 0;
        if held.claim.is_none() {
            return Step::Done;
        }
        held.releasing = true;
        Step::Release
    }

    fn unlock_sync(&self) -> Result<()> {
        match self.begin_unlock() {
            Step::Release => self.release_sync(),
            Step::Wait => self.release_finished_sync(),
            Step::Done | Step::Acquire => Ok(()),
        }
    }

    /// Wait until no release is running on this object.
    async fn release_finished(&self) {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let releasing = self.held().releasing;
            if !releasing {
                return;
            }
            notified.await;
        }
    }

    /// Blocking twin of `release_finished`, bounded by the configured timeout.
    fn release_finished_sync(&self) -> Result<()> {
        let held = self.held();
        let (_held, waited) = self
            .idle
            .wait_timeout_while(held, self.config.timeout(), |held| held.releasing)
            .unwrap_or_else(PoisonError::into_inner);
        if waited.timed_out() {
            return Err(LockfileError::Locked {
                path: self.path.clone(),
                reason: Some("release in progress in this process".to_string()),
            });
        }
        Ok(())
    }

    fn is_stale(&self, modified: SystemTime) -> bool {
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age > self.config.stale())
    }

    fn retry_interval(&self, opts: &AcquireOptions) -> Duration {
        opts.retry_interval
            .unwrap_or_else(|| self.config.retry_interval_or(DEFAULT_RETRY_INTERVAL))
    }

    fn claim_info(&self, modified: SystemTime, info: Option<MutexInfo>) -> ClaimInfo {
        ClaimInfo {
            path: self.path.clone(),
            info,
            modified,
            stale: self.is_stale(modified),
        }
    }

    async fn acquire(&self, opts: AcquireOptions) -> Result<()> {
        let timeout = opts.timeout.unwrap_or_else(|| self.config.timeout());
        let mut backoff = Backoff::new(timeout, self.retry_interval(&opts));

        loop {
            match fs::create_claim_dir(&self.path).await {
                Ok(()) => break,
                Err(e) if fs::is_contended(&e) => {}
                Err(e) => return Err(e.into()),
            }
            if self.held().claim.is_some() {
                return Ok(());
            }

            let reason = self.owner_reason().await;
            debug!(path = %self.path.display(), reason = ?reason, "waiting for lock");
            if let Some(if_locked) = &opts.if_locked {
                if_locked(reason.as_deref());
            }

            if backoff.exhausted() {
                return Err(LockfileError::Locked {
                    path: self.path.clone(),
                    reason,
                });
            }

            if self.clear_if_stale().await? {
                continue;
            }

            tokio::time::sleep(backoff.next_delay()).await;
        }

        let info = MutexInfo::new(&self.uuid, opts.reason.as_deref());
        if let Err(e) = fs::write_json(&self.info_path, &info).await {
            warn!(path = %self.info_path.display(), error = %e, "failed to write owner info");
        }
        self.start_heartbeat();
        Ok(())
    }

    fn acquire_sync(&self, opts: &AcquireOptions) -> Result<()> {
        let pause = self.retry_interval(opts);
        let mut retries = self.config.sync_retries;

        loop {
            match fs::create_claim_dir_sync(&self.path) {
                Ok(()) => break,
                Err(e) if fs::is_contended(&e) => {}
                Err(e) => return Err(e.into()),
            }
            if self.held().claim.is_some() {
                return Ok(());
            }

            if self.clear_if_stale_sync()? {
                continue;
            }

            let reason = self.owner_reason_sync();
            if let Some(if_locked) = &opts.if_locked {
                if_locked(reason.as_deref());
            }
            if retries == 0 {
                return Err(LockfileError::Locked {
                    path: self.path.clone(),
                    reason,
                });
            }
            retries -= 1;
            debug!(path = %self.path.display(), reason = ?reason, retries, "waiting for lock");
            std::thread::sleep(jitter(pause));
        }

        let info = MutexInfo::new(&self.uuid, opts.reason.as_deref());
        if let Err(e) = fs::write_json_sync(&self.info_path, &info) {
            warn!(path = %self.info_path.display(), error = %e, "failed to write owner info");
        }
        self.start_heartbeat();
        Ok(())
    }

    fn start_heartbeat(&self) {
        let heartbeat = Heartbeat::start(self.path.clone(), self.config.heartbeat());
        self.held().claim = Some(heartbeat);
    }

    /// Remove the claim. The caller has already marked the object as releasing.
    ///
    /// Finishes synchronously if the future is dropped part way.
    async fn release(&self) -> Result<()> {
        debug!(path = %self.path.display(), "unlock");
        let mut pending = PendingRelease {
            core: self,
            armed: true,
        };
        let result = self.remove_claim().await;
        pending.armed = false;
        self.finish_release(result.is_ok());
        result
    }

    fn release_sync(&self) -> Result<()> {
        debug!(path = %self.path.display(), "unlock_sync");
        let result = self.remove_claim_sync();
        self.finish_release(result.is_ok());
        result
    }

    async fn remove_claim(&self) -> Result<()> {
        fs::remove_dir_if_exists(&self.path).await?;
        fs::remove_file_if_exists(&self.info_path).await?;
        Ok(())
    }

    fn remove_claim_sync(&self) -> Result<()> {
        fs::remove_dir_if_exists_sync(&self.path)?;
        fs::remove_file_if_exists_sync(&self.info_path)?;
        Ok(())
    }

    /// Leave the releasing state and wake waiters. A failed removal keeps the
    /// claim, and its heartbeat, with a count of zero.
    fn finish_release(&self, removed: bool) {
        let heartbeat = {
            let mut held = self.held();
            held.releasing = false;
            if removed { held.claim.take() } else { None }
        };
        drop(heartbeat);
        self.idle.notify_all();
        self.released.notify_waiters();
    }

    /// True when the claim is absent, or was stale and has been removed.
    async fn clear_if_stale(&self) -> Result<bool> {
        let Some(modified) = fs::mtime(&self.path).await? else {
            return Ok(true);
        };
        if !self.is_stale(modified) {
            return Ok(false);
        }
        debug!(path = %self.path.display(), "stale claim, deleting");
        fs::remove_dir_if_exists(&self.path).await?;
        Ok(true)
    }

    fn clear_if_stale_sync(&self) -> Result<bool> {
        let Some(modified) = fs::mtime_sync(&self.path)? else {
            return Ok(true);
        };
        if !self.is_stale(modified) {
            return Ok(false);
        }
        debug!(path = %self.path.display(), "stale claim, deleting");
        fs::remove_dir_if_exists_sync(&self.path)?;
        Ok(true)
    }

    async fn owner_reason(&self) -> Option<String> {
        match fs::read_json::<MutexInfo>(&self.info_path).await {
            Ok(info) => info.and_then(|i| i.reason),
            Err(e) => {
                debug!(path = %self.info_path.display(), error = %e, "unreadable owner info");
                None
            }
        }
    }

    fn owner_reason_sync(&self) -> Option<String> {
        match fs::read_json_sync::<MutexInfo>(&self.info_path) {
            Ok(info) => info.and_then(|i| i.reason),
            Err(e) => {
                debug!(path = %self.info_path.display(), error = %e, "unreadable owner info");
                None
            }
        }
    }
}

/// Completes a release whose future was dropped before it finished.
struct PendingRelease<'a> {
    core: &'a Core,
    armed: bool,
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let result = self.core.remove_claim_sync();
        if let Err(e) = &result {
            warn!(path = %self.core.path.display(), error = %e, "failed to finish cancelled release");
        }
        self.core.finish_release(result.is_ok());
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
