//! Command implementations for rwlockfile.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Commands report failures through `anyhow`; lock errors
//! keep their `LockfileError` type inside so `main` can pick the exit code.

mod clear;
mod exec;
mod status;

use crate::cli::{Cli, Command};
use rwlockfile::{LockConfig, LockfileError, exit_codes};
use std::io;
use std::path::Path;

/// Dispatch a command to its implementation.
///
/// Returns the exit code to finish with on success. `exec` forwards its
/// child's code; every other command succeeds with 0.
pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Status(args) => status::cmd_status(args, config).await?,
        Command::Clear(args) => clear::cmd_clear(args).await?,
        Command::Exec(args) => return exec::cmd_exec(args, config).await,
    }
    Ok(exit_codes::SUCCESS)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<LockConfig> {
    match path {
        Some(path) => Ok(LockConfig::load(path)?),
        None => Ok(LockConfig::default()),
    }
}

/// Pick the process exit code for a failed command.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(lock_err) = err.downcast_ref::<LockfileError>() {
        return lock_err.exit_code();
    }
    if err.chain().any(|cause| cause.is::<io::Error>()) {
        return exit_codes::IO_FAILURE;
    }
    exit_codes::USER_ERROR
}
