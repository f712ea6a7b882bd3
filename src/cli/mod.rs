//! CLI argument parsing for rwlockfile.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand, ValueEnum};
use rwlockfile::LockType;
use std::path::PathBuf;

/// rwlockfile: inspect, clear, and run commands under filesystem locks.
///
/// A lock is named by its base path:
/// - a mutex claims the directory `<BASE>.lock`
/// - a read/write lock keeps its state in the file `<BASE>.lock`
#[derive(Parser, Debug)]
#[command(name = "rwlockfile")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML file with lock timings (timeout_ms, stale_ms, heartbeat_ms, ...).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for rwlockfile.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show who holds a lock.
    ///
    /// Reports the mutex claim (owner, heartbeat age, staleness) or the
    /// read/write state (writer, readers, whether each owner is alive).
    Status(StatusArgs),

    /// Forcibly remove a lock's files.
    ///
    /// Deletes the claim directory, info file, and state file for a base path.
    Clear(ClearArgs),

    /// Run a command while holding a lock.
    ///
    /// Exits with the command's exit code.
    Exec(ExecArgs),
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base path of the lock.
    pub base: PathBuf,

    /// Print a JSON report instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Base path of the lock.
    pub base: PathBuf,

    /// Required: confirm that the lock should be removed even if held.
    #[arg(long)]
    pub force: bool,
}

/// Which lock `exec` takes.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    /// Exclusive directory mutex.
    Mutex,
    /// Shared read lock.
    Read,
    /// Exclusive write lock.
    Write,
}

impl ExecMode {
    /// The read/write kind, or `None` for the mutex.
    pub fn lock_type(self) -> Option<LockType> {
        match self {
            ExecMode::Mutex => None,
            ExecMode::Read => Some(LockType::Read),
            ExecMode::Write => Some(LockType::Write),
        }
    }
}

/// Arguments for the `exec` command.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Base path of the lock.
    pub base: PathBuf,

    /// Lock to take.
    #[arg(long, value_enum, default_value = "mutex")]
    pub mode: ExecMode,

    /// Reason recorded with the lock (defaults to the command line).
    #[arg(long)]
    pub reason: Option<String>,

    /// Give up waiting after this many milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Command as one shell-quoted string, instead of trailing arguments.
    #[arg(short = 'c', long = "command", conflicts_with = "args")]
    pub command_line: Option<String>,

    /// Command and arguments to run (after `--`).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
