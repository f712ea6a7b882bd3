//! Read/write lock state persisted at `<base>.lock`.
//!
//! The state is only mutated while the lock's private mutex is held; reads
//! for display (`RwLockfile::state`) may happen at any time.

use super::metadata::{FORMAT_VERSION, local_hostname};
use super::types::{LockStatus, LockType};
use crate::error::Result;
use crate::fs;
use crate::liveness::current_pid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One ownership claim: a writer, or one of the readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Id of the owning lock object.
    pub uuid: String,

    /// Process ID of the owner.
    pub pid: i64,

    /// Why the lock was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Host the owner runs on. Jobs from other hosts are never pruned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// When the claim was registered.
    #[serde(default = "unix_epoch")]
    pub created: DateTime<Utc>,
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

impl Job {
    /// A job owned by `uuid` in this process.
    pub fn new(uuid: &str, reason: Option<&str>) -> Self {
        Self {
            uuid: uuid.to_string(),
            pid: current_pid(),
            reason: reason.map(str::to_string),
            hostname: local_hostname(),
            created: Utc::now(),
        }
    }

    /// Whether this job's pid can be probed from this host.
    pub fn is_local(&self) -> bool {
        match (&self.hostname, local_hostname()) {
            (Some(theirs), Some(ours)) => *theirs == ours,
            _ => true,
        }
    }
}

/// The shared read/write lock document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFileState {
    #[serde(default = "format_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writer: Option<Job>,

    #[serde(default)]
    pub readers: Vec<Job>,
}

fn format_version() -> String {
    FORMAT_VERSION.to_string()
}

impl Default for LockFileState {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFileState {
    pub fn new() -> Self {
        Self {
            version: format_version(),
            writer: None,
            readers: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }

    pub fn add_job(&mut self, kind: LockType, job: Job) {
        self.version = format_version();
        match kind {
            LockType::Read => self.readers.push(job),
            LockType::Write => self.writer = Some(job),
        }
    }

    /// Drop the entry of `kind` owned by `uuid`. Returns whether anything changed.
    pub fn remove_owned(&mut self, kind: LockType, uuid: &str) -> bool {
        match kind {
            LockType::Read => {
                let before = self.readers.len();
                self.readers.retain(|r| r.uuid != uuid);
                self.readers.len() != before
            }
            LockType::Write => {
                if self.writer.as_ref().is_some_and(|w| w.uuid == uuid) {
                    self.writer = None;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Remove the given jobs wherever they appear. Returns how many were removed.
    pub fn prune(&mut self, dead: &[Job]) -> usize {
        let mut removed = 0;
        if self.writer.as_ref().is_some_and(|w| dead.contains(w)) {
            self.writer = None;
            removed += 1;
        }
        let before = self.readers.len();
        self.readers.retain(|r| !dead.contains(r));
        removed + (before - self.readers.len())
    }

    /// What blocks a `kind` request from the object `own_uuid`.
    pub fn status(&self, kind: LockType, own_uuid: &str) -> LockStatus {
        if let Some(writer) = &self.writer
            && writer.uuid != own_uuid
        {
            return LockStatus::WriteLock {
                job: writer.clone(),
            };
        }

        if kind == LockType::Write {
            let jobs: Vec<Job> = self
                .readers
                .iter()
                .filter(|r| r.uuid != own_uuid)
                .cloned()
                .collect();
            if !jobs.is_empty() {
                return LockStatus::ReadLock { jobs };
            }
        }

        LockStatus::Open
    }
}

pub(crate) async fn fetch(path: &Path) -> Result<LockFileState> {
    Ok(fs::read_json(path).await?.unwrap_or_default())
}

pub(crate) fn fetch_sync(path: &Path) -> Result<LockFileState> {
    Ok(fs::read_json_sync(path)?.unwrap_or_default())
}

pub(crate) async fn store(path: &Path, state: &LockFileState) -> Result<()> {
    fs::write_json(path, state).await
}

pub(crate) fn store_sync(path: &Path, state: &LockFileState) -> Result<()> {
    fs::write_json_sync(path, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockfileError;
    use tempfile::TempDir;

    fn job(uuid: &str, reason: Option<&str>) -> Job {
        Job::new(uuid, reason)
    }

    #[test]
    fn writer_blocks_everyone_else() {
        let mut state = LockFileState::new();
        state.add_job(LockType::Write, job("a", Some("deploy")));

        for kind in LockType::ALL {
            match state.status(kind, "b") {
                LockStatus::WriteLock { job } => assert_eq!(job.reason.as_deref(), Some("deploy")),
                other => panic!("expected write lock, got {:?}", other),
            }
        }
        assert!(state.status(LockType::Read, "a").is_open());
    }

    #[test]
    fn readers_only_block_writers() {
        let mut state = LockFileState::new();
        state.add_job(LockType::Read, job("a", None));
        state.add_job(LockType::Read, job("b", Some("mylock")));

        assert!(state.status(LockType::Read, "c").is_open());
        match state.status(LockType::Write, "a") {
            LockStatus::ReadLock { jobs } => {
                assert_eq!(jobs.len(), 1);
                assert_eq!(jobs[0].uuid, "b");
            }
            other => panic!("expected read lock, got {:?}", other),
        }
    }

    #[test]
    fn own_readers_do_not_block_promotion() {
        let mut state = LockFileState::new();
        state.add_job(LockType::Read, job("a", None));
        assert!(state.status(LockType::Write, "a").is_open());
    }

    #[test]
    fn remove_owned_only_touches_own_entries() {
        let mut state = LockFileState::new();
        state.add_job(LockType::Write, job("a", None));
        state.add_job(LockType::Read, job("a", None));
        state.add_job(LockType::Read, job("b", None));

        assert!(!state.remove_owned(LockType::Write, "b"));
        assert!(state.remove_owned(LockType::Read, "a"));
        assert_eq!(state.readers.len(), 1);
        assert!(state.remove_owned(LockType::Write, "a"));
        assert!(state.writer.is_none());
    }

    #[test]
    fn prune_removes_writer_and_readers() {
        let mut state = LockFileState::new();
        let dead_writer = job("w", None);
        let dead_reader = job("r1", None);
        state.add_job(LockType::Write, dead_writer.clone());
        state.add_job(LockType::Read, dead_reader.clone());
        state.add_job(LockType::Read, job("r2", None));

        assert_eq!(state.prune(&[dead_writer, dead_reader]), 2);
        assert!(state.writer.is_none());
        assert_eq!(state.readers.len(), 1);
    }

    #[test]
    fn missing_created_defaults_to_epoch() {
        let job: Job = serde_json::from_str(r#"{"uuid":"x","pid":7}"#).unwrap();
        assert_eq!(job.created, DateTime::<Utc>::UNIX_EPOCH);
        assert!(job.is_local());
    }

    #[test]
    fn foreign_host_jobs_are_not_local() {
        let mut foreign = job("x", None);
        foreign.hostname = Some("definitely-not-this-host.invalid".to_string());
        if local_hostname().is_some() {
            assert!(!foreign.is_local());
        }
    }

    #[test]
    fn missing_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let state = fetch_sync(&dir.path().join("a.lock")).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        std::fs::write(&path, "[1, 2").unwrap();

        let err = fetch_sync(&path).unwrap_err();
        assert!(matches!(err, LockfileError::CorruptState { .. }));
    }

    #[tokio::test]
    async fn store_then_fetch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        let mut state = LockFileState::new();
        state.add_job(LockType::Read, job("a", Some("indexing")));

        store(&path, &state).await.unwrap();
        assert_eq!(fetch(&path).await.unwrap(), state);
    }
}
