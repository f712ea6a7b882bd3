//! Lock kinds, per-call options, counts and status values.

use super::metadata::{MutexInfo, age_string};
use super::state::Job;
use crate::error::LockfileError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Kind of read/write lock entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    /// Shared access; any number of readers may hold it at once.
    Read,
    /// Exclusive access.
    Write,
}

impl LockType {
    pub const ALL: [LockType; 2] = [LockType::Read, LockType::Write];

    pub fn as_str(&self) -> &'static str {
        match self {
            LockType::Read => "read",
            LockType::Write => "write",
        }
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockType {
    type Err = LockfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(LockType::Read),
            "write" => Ok(LockType::Write),
            other => Err(LockfileError::InvalidTarget(format!(
                "unknown lock type '{}' (expected 'read' or 'write')",
                other
            ))),
        }
    }
}

/// Callback run while an acquisition is blocked, given the holder's reason.
pub type IfLocked = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Options for a single acquisition.
///
/// Unset fields fall back to the lock object's `LockConfig`.
#[derive(Clone, Default)]
pub struct AcquireOptions {
    /// Label stored with the claim and shown to blocked contenders.
    pub reason: Option<String>,
    /// Invoked when the lock is found held by someone else.
    pub if_locked: Option<IfLocked>,
    /// Total time to keep retrying.
    pub timeout: Option<Duration>,
    /// Base retry interval; doubled after every wait.
    pub retry_interval: Option<Duration>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn if_locked<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        self.if_locked = Some(Arc::new(f));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }
}

impl fmt::Debug for AcquireOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquireOptions")
            .field("reason", &self.reason)
            .field("if_locked", &self.if_locked.is_some())
            .field("timeout", &self.timeout)
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}

/// Local reference counts of a read/write lock object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LockCounts {
    pub read: usize,
    pub write: usize,
}

impl LockCounts {
    pub fn get(&self, kind: LockType) -> usize {
        match kind {
            LockType::Read => self.read,
            LockType::Write => self.write,
        }
    }

    pub fn total(&self) -> usize {
        self.read + self.write
    }
}

/// Result of checking whether a read or write lock could be taken.
///
/// Entries owned by the checking object are never reported as blocking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LockStatus {
    /// Nothing blocks the requested lock.
    Open,
    /// Another owner holds the write lock.
    WriteLock { job: Job },
    /// Other owners hold read locks (only reported for write requests).
    ReadLock { jobs: Vec<Job> },
}

impl LockStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, LockStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Open => "open",
            LockStatus::WriteLock { .. } => "write_lock",
            LockStatus::ReadLock { .. } => "read_lock",
        }
    }
}

/// Snapshot of a mutex claim as seen on disk.
#[derive(Debug, Clone)]
pub struct ClaimInfo {
    /// The claim directory.
    pub path: PathBuf,

    /// Owner info, if the info file was readable.
    pub info: Option<MutexInfo>,

    /// Last heartbeat.
    pub modified: SystemTime,

    /// Whether the heartbeat is older than the stale threshold.
    pub stale: bool,
}

impl ClaimInfo {
    /// Time since the last heartbeat.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.modified)
            .unwrap_or_default()
    }
}

impl fmt::Display for ClaimInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        match &self.info {
            Some(info) => write!(
                f,
                " (pid: {}, host: {}, heartbeat: {} ago, reason: {}",
                info.pid,
                info.hostname.as_deref().unwrap_or("unknown"),
                age_string(self.age()),
                info.reason.as_deref().unwrap_or("-"),
            )?,
            None => write!(f, " (owner unknown, heartbeat: {} ago", age_string(self.age()))?,
        }
        write!(f, "{})", if self.stale { ", STALE" } else { "" })
    }
}
