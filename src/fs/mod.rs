//! Filesystem gateway for rwlockfile.
//!
//! Every lock decision is made from what these helpers observe on disk:
//! directory presence for claims, modification times for heartbeats, and JSON
//! documents for owner info and read/write state. Each operation comes as an
//! async (`tokio::fs`) function and a blocking `_sync` twin.
//!
//! Errors other than "not found" races are returned untouched so callers can
//! propagate them unchanged.

pub mod atomic;
mod claim;
mod json;

pub use atomic::{atomic_write, atomic_write_sync};
pub use claim::{
    create_claim_dir, create_claim_dir_sync, is_contended, lock_path, mtime, mtime_sync,
    remove_dir_if_exists, remove_dir_if_exists_sync, remove_file_if_exists,
    remove_file_if_exists_sync, touch_sync,
};
pub use json::{read_json, read_json_sync, write_json, write_json_sync};
