//! Owner info written next to a mutex claim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

/// Version stamped into every file this crate writes.
pub const FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

static HOSTNAME: LazyLock<Option<String>> = LazyLock::new(|| {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
});

/// Contents of `<base>.lock.info.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexInfo {
    /// Crate version of the writer.
    pub version: String,

    /// Id of the lock object holding the claim.
    pub uuid: String,

    /// Process ID of the holder.
    pub pid: i64,

    /// Host the holder runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Why the claim was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MutexInfo {
    /// Info for a claim held by this process.
    pub fn new(uuid: &str, reason: Option<&str>) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            uuid: uuid.to_string(),
            pid: crate::liveness::current_pid(),
            hostname: local_hostname(),
            reason: reason.map(str::to_string),
        }
    }
}

/// Name of this host, if it can be determined.
pub fn local_hostname() -> Option<String> {
    HOSTNAME.clone()
}

/// Format a duration as a short human-readable age.
pub fn age_string(age: Duration) -> String {
    let seconds = age.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h", days, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Age of a timestamp relative to now; zero for timestamps in the future.
pub fn age_since(time: DateTime<Utc>) -> Duration {
    Utc::now()
        .signed_duration_since(time)
        .to_std()
        .unwrap_or_default()
}
