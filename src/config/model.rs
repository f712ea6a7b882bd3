//! LockConfig struct definition and default implementation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default acquisition budget (30 seconds).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Age after which an un-refreshed claim is presumed abandoned.
pub const DEFAULT_STALE_MS: u64 = 10_000;

/// Interval between heartbeat touches of a held claim.
pub const DEFAULT_HEARTBEAT_MS: u64 = 1_000;

/// Attempts made by blocking acquisitions before giving up.
pub const DEFAULT_SYNC_RETRIES: u32 = 20;

/// Configuration shared by `Lockfile` and `RwLockfile`.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Total time an async acquisition may spend waiting, in milliseconds.
    pub timeout_ms: u64,

    /// Base retry interval in milliseconds.
    ///
    /// When unset, each lock kind uses its own default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval_ms: Option<u64>,

    /// Claims whose heartbeat is older than this are treated as abandoned.
    pub stale_ms: u64,

    /// How often a held claim refreshes its modification time.
    pub heartbeat_ms: u64,

    /// Number of attempts made by `add_sync` before failing.
    pub sync_retries: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_interval_ms: None,
            stale_ms: DEFAULT_STALE_MS,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            sync_retries: DEFAULT_SYNC_RETRIES,
        }
    }
}

impl LockConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = duration_ms(timeout);
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = Some(duration_ms(interval));
        self
    }

    pub fn with_stale(mut self, stale: Duration) -> Self {
        self.stale_ms = duration_ms(stale);
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat_ms = duration_ms(heartbeat);
        self
    }

    pub fn with_sync_retries(mut self, retries: u32) -> Self {
        self.sync_retries = retries;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The configured retry interval, or `default` when none was set.
    pub fn retry_interval_or(&self, default: Duration) -> Duration {
        self.retry_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    pub fn stale(&self) -> Duration {
        Duration::from_millis(self.stale_ms)
    }

    /// Heartbeat tick, never shorter than one millisecond.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
