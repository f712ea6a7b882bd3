//! Configuration model for rwlockfile.
//!
//! This module defines the `LockConfig` struct that controls timeouts, retry
//! pacing, staleness, and the heartbeat tick of every lock object. It supports
//! forward-compatible YAML parsing (unknown fields are ignored), sensible
//! defaults for every field, and validation of config values.

mod model;
mod operations;


// Re-export public API
pub use model::{
    DEFAULT_HEARTBEAT_MS, DEFAULT_STALE_MS, DEFAULT_SYNC_RETRIES, DEFAULT_TIMEOUT_MS, LockConfig,
};
