//! rwlockfile: inspect and use filesystem locks from the command line.
//!
//! This is the main entry point for the `rwlockfile` CLI. It parses arguments,
//! dispatches to the appropriate command handler, and handles errors with
//! proper exit codes.

mod cli;
mod commands;

use cli::Cli;
use rwlockfile::exit_codes;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `rwlockfile=debug`.
const LOG_ENV: &str = "RWLOCKFILE_LOG";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing();

    // Locks still held when the process exits are released by the hook; the
    // guard covers a normal return from main.
    rwlockfile::install_exit_hook();
    let _shutdown = rwlockfile::shutdown_guard();

    match commands::dispatch(cli).await {
        Ok(code) => exit_code(code),
        Err(err) => {
            // Print user-actionable error message to stderr
            eprintln!("Error: {:#}", err);

            exit_code(commands::exit_code_for(&err))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code)
        .map(ExitCode::from)
        .unwrap_or_else(|_| ExitCode::from(exit_codes::INTERNAL_ERROR as u8))
}
