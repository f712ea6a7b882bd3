use crate::config::LockConfig;
use crate::liveness::ProcessLiveness;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Liveness checker with an explicit list of dead pids.
///
/// Clones share the list, so a test can keep one and hand another to a lock.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeLiveness {
    dead: Arc<Mutex<HashSet<i64>>>,
}

impl FakeLiveness {
    pub(crate) fn with_dead(pids: &[i64]) -> Self {
        let fake = Self::default();
        for pid in pids {
            fake.kill(*pid);
        }
        fake
    }

    pub(crate) fn kill(&self, pid: i64) {
        self.dead
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .insert(pid);
    }
}

impl ProcessLiveness for FakeLiveness {
    fn is_alive(&self, pid: i64) -> bool {
        pid > 0
            && !self
                .dead
                .lock()
                .unwrap_or_else(|poison| poison.into_inner())
                .contains(&pid)
    }
}

/// A pid no test process will have.
pub(crate) const DEAD_PID: i64 = 999_999_999;

/// Timings short enough for tests; staleness stays at the real 10s.
pub(crate) fn fast_config() -> LockConfig {
    LockConfig::default()
        .with_timeout(Duration::from_millis(200))
        .with_retry_interval(Duration::from_millis(5))
        .with_heartbeat(Duration::from_millis(50))
        .with_sync_retries(5)
}

/// A base path inside `dir`, nested so parent creation is exercised.
pub(crate) fn base_in(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join("locks").join(name)
}

/// Set the mtime of `path` to `secs` seconds ago.
pub(crate) fn backdate(path: &Path, secs: u64) {
    let past = SystemTime::now() - Duration::from_secs(secs);
    crate::fs::touch_sync(path, past).unwrap();
}
