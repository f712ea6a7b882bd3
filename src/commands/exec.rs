//! Implementation of the `rwlockfile exec` command.
//!
//! Runs a child process while holding one lock reference and exits with the
//! child's code. The lock is released whether the child succeeds or not.

use crate::cli::ExecArgs;
use anyhow::Context;
use rwlockfile::{
    AcquireOptions, LockConfig, LockHandle, Lockfile, RwLockfile, exit_codes, with_lock,
};
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Execute the `rwlockfile exec` command.
///
/// Returns the child's exit code. A child killed by a signal reports
/// `128 + signal`, as shells do.
pub async fn cmd_exec(args: ExecArgs, config: LockConfig) -> anyhow::Result<i32> {
    let argv = command_argv(&args)?;
    let reason = args.reason.clone().unwrap_or_else(|| argv.join(" "));

    let handle: LockHandle = match args.mode.lock_type() {
        None => Lockfile::with_config(&args.base, config).into(),
        Some(_) => RwLockfile::with_config(&args.base, config).into(),
    };

    let announced = Arc::new(AtomicBool::new(false));
    let path = handle.path().display().to_string();
    let mut opts = AcquireOptions::new()
        .reason(reason)
        .if_locked(move |holder| {
            if !announced.swap(true, Ordering::Relaxed) {
                eprintln!(
                    "Waiting for {} (held: {})",
                    path,
                    holder.unwrap_or("unknown reason")
                );
            }
        });
    if let Some(ms) = args.timeout_ms {
        opts = opts.timeout(Duration::from_millis(ms));
    }

    with_lock(&handle, args.mode.lock_type(), opts, || run_child(&argv)).await
}

/// The program and arguments to run, from either command form.
fn command_argv(args: &ExecArgs) -> anyhow::Result<Vec<String>> {
    let argv = match &args.command_line {
        Some(line) => shell_words::split(line)
            .with_context(|| format!("failed to parse command '{}'", line))?,
        None => args.args.clone(),
    };
    if argv.is_empty() {
        anyhow::bail!("no command given; pass it after `--` or with --command");
    }
    Ok(argv)
}

async fn run_child(argv: &[String]) -> anyhow::Result<i32> {
    let Some((program, rest)) = argv.split_first() else {
        anyhow::bail!("no command given");
    };
    tracing::debug!(program = %program, args = ?rest, "starting command");

    let status = tokio::process::Command::new(program)
        .args(rest)
        .status()
        .await
        .with_context(|| format!("failed to start '{}'", program))?;
    Ok(status_code(status))
}

fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    exit_codes::INTERNAL_ERROR
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::ExecMode;
    use rwlockfile::{LockType, LockfileError};
    use serial_test::serial;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn exec_args(base: PathBuf, mode: ExecMode, args: &[&str]) -> ExecArgs {
        ExecArgs {
            base,
            mode,
            reason: None,
            timeout_ms: None,
            command_line: None,
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Restores the working directory on drop.
    struct DirGuard {
        original: PathBuf,
    }

    impl DirGuard {
        fn new(dir: &Path) -> Self {
            let original = std::env::current_dir().unwrap();
            std::env::set_current_dir(dir).unwrap();
            Self { original }
        }
    }

    impl Drop for DirGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.original);
        }
    }

    #[tokio::test]
    async fn forwards_the_child_exit_code() {
        let dir = TempDir::new().unwrap();
        let mutex_base = dir.path().join("m");
        let rw_base = dir.path().join("rw");

        let args = exec_args(mutex_base.clone(), ExecMode::Mutex, &["true"]);
        assert_eq!(cmd_exec(args, LockConfig::default()).await.unwrap(), 0);

        let mut args = exec_args(rw_base.clone(), ExecMode::Write, &[]);
        args.command_line = Some("sh -c 'exit 3'".to_string());
        assert_eq!(cmd_exec(args, LockConfig::default()).await.unwrap(), 3);

        // Both locks were released.
        assert!(Lockfile::new(&mutex_base).check().await.unwrap());
        let rw = RwLockfile::new(&rw_base);
        assert!(rw.state().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn child_sees_the_lock_held() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        let probe = format!("test -d '{}.lock'", base.display());

        let mut args = exec_args(base.clone(), ExecMode::Mutex, &[]);
        args.command_line = Some(format!("sh -c \"{}\"", probe));
        assert_eq!(cmd_exec(args, LockConfig::default()).await.unwrap(), 0);
        assert!(!base.with_file_name("db.lock").exists());
    }

    #[tokio::test]
    async fn gives_up_when_write_locked() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        let holder = RwLockfile::new(&base);
        holder
            .add(LockType::Write, AcquireOptions::new().reason("migrating"))
            .await
            .unwrap();

        let mut args = exec_args(base.clone(), ExecMode::Read, &["true"]);
        args.timeout_ms = Some(100);
        let err = cmd_exec(args, LockConfig::default()).await.unwrap_err();

        let lock_err = err.downcast_ref::<LockfileError>().unwrap();
        assert!(lock_err.is_timeout());
        assert_eq!(lock_err.conflicting_reason(), Some("migrating"));
        assert_eq!(crate::commands::exit_code_for(&err), exit_codes::LOCK_FAILURE);
        holder.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_an_io_failure() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");

        let args = exec_args(base.clone(), ExecMode::Mutex, &["./definitely-not-a-program"]);
        let err = cmd_exec(args, LockConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
        assert_eq!(crate::commands::exit_code_for(&err), exit_codes::IO_FAILURE);
        assert!(!base.with_file_name("db.lock").exists());
    }

    #[test]
    fn empty_command_is_rejected() {
        let args = exec_args(PathBuf::from("db"), ExecMode::Mutex, &[]);
        assert!(command_argv(&args).is_err());

        let mut args = exec_args(PathBuf::from("db"), ExecMode::Mutex, &[]);
        args.command_line = Some("echo 'unterminated".to_string());
        assert!(command_argv(&args).is_err());
    }

    #[tokio::test]
    #[serial]
    async fn relative_base_resolves_against_working_directory() {
        let dir = TempDir::new().unwrap();
        let _cwd = DirGuard::new(dir.path());

        let probe = "test -d locks/db.lock";
        let mut args = exec_args(PathBuf::from("locks/db"), ExecMode::Mutex, &[]);
        args.command_line = Some(format!("sh -c '{}'", probe));
        assert_eq!(cmd_exec(args, LockConfig::default()).await.unwrap(), 0);
        assert!(dir.path().join("locks").is_dir());
        assert!(!dir.path().join("locks/db.lock").exists());
    }
}
