//! Error types for rwlockfile.
//!
//! Uses thiserror for derive macros. Lock conflicts carry the blocking owner's
//! `reason` so callers can tell who is holding the lock.
//!
//! The error is `Clone` because a single in-flight acquisition may fail for
//! several local waiters at once; I/O and JSON sources are kept behind `Arc`.

use crate::exit_codes;
use crate::locks::LockType;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug, Clone)]
pub enum LockfileError {
    /// The mutex stayed held by a live owner until the timeout ran out.
    #[error("{} is locked{}", .path.display(), reason_suffix(.reason))]
    Locked {
        /// The claim directory that could not be created.
        path: PathBuf,
        /// The reason recorded by the current owner, if it could be read.
        reason: Option<String>,
    },

    /// A read or write entry held by another owner blocks the request.
    #[error("{kind} lock exists: {}", conflict_detail(.reason, .path))]
    LockExists {
        /// The kind of lock that is blocking.
        kind: LockType,
        /// The state file holding the conflicting entry.
        path: PathBuf,
        /// The reason recorded by the conflicting entry.
        reason: Option<String>,
    },

    /// A lock handle was paired with a mode it does not support.
    #[error("invalid lock target: {0}")]
    InvalidTarget(String),

    /// A status check produced a status the caller cannot act on.
    #[error("unexpected status: {0}")]
    UnexpectedStatus(String),

    /// The shared state file exists but does not contain a valid lock state.
    #[error("corrupt lock state '{}': {source}", .path.display())]
    CorruptState {
        /// Path of the unreadable file.
        path: PathBuf,
        /// The parse failure.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Configuration could not be read or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Any other filesystem failure, passed through unchanged.
    #[error(transparent)]
    Io(Arc<io::Error>),
}

impl LockfileError {
    pub(crate) fn corrupt_state(path: &Path, source: serde_json::Error) -> Self {
        LockfileError::CorruptState {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Whether this error means the lock stayed held until the timeout ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LockfileError::Locked { .. } | LockfileError::LockExists { .. }
        )
    }

    /// The reason recorded by whoever holds the conflicting lock.
    pub fn conflicting_reason(&self) -> Option<&str> {
        match self {
            LockfileError::Locked { reason, .. } | LockfileError::LockExists { reason, .. } => {
                reason.as_deref()
            }
            _ => None,
        }
    }

    /// The underlying I/O error kind, for errors that came from the filesystem.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            LockfileError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockfileError::Locked { .. } | LockfileError::LockExists { .. } => {
                exit_codes::LOCK_FAILURE
            }
            LockfileError::InvalidTarget(_) | LockfileError::Config(_) => exit_codes::USER_ERROR,
            LockfileError::UnexpectedStatus(_) => exit_codes::INTERNAL_ERROR,
            LockfileError::CorruptState { .. } | LockfileError::Io(_) => exit_codes::IO_FAILURE,
        }
    }
}

impl From<io::Error> for LockfileError {
    fn from(e: io::Error) -> Self {
        LockfileError::Io(Arc::new(e))
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(": {}", r),
        None => String::new(),
    }
}

fn conflict_detail(reason: &Option<String>, path: &Path) -> String {
    match reason {
        Some(r) => r.clone(),
        None => path.display().to_string(),
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockfileError>;
