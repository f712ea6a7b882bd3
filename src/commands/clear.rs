//! Implementation of the `rwlockfile clear` command.
//!
//! Removes every file a lock may leave behind for a base path, whichever
//! kind of lock it is. The owners are not notified.

use crate::cli::ClearArgs;
use rwlockfile::fs::{lock_path, remove_dir_if_exists, remove_file_if_exists};
use std::path::{Path, PathBuf};

/// Execute the `rwlockfile clear` command.
pub async fn cmd_clear(args: ClearArgs) -> anyhow::Result<()> {
    if !args.force {
        anyhow::bail!(
            "refusing to clear lock without --force flag.\n\n\
             Clearing locks can cause data corruption if the lock holder is still active.\n\
             Only clear locks if you are certain the lock holder has crashed.\n\n\
             To clear the lock, run:\n  rwlockfile clear {} --force",
            args.base.display()
        );
    }

    let removed = clear_files(&args.base).await?;
    if removed.is_empty() {
        println!("No lock files found for {}.", args.base.display());
        return Ok(());
    }

    println!("Cleared lock: {}", args.base.display());
    println!();
    println!("Removed:");
    for path in &removed {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Remove the claim, info, state, and guard files of `base`.
///
/// Returns the paths that existed.
pub async fn clear_files(base: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let target = lock_path(base, ".lock");
    let guard = lock_path(&target, ".lock");
    let mut removed = Vec::new();

    for (path, is_claim) in [
        (lock_path(&guard, ".info.json"), false),
        (guard, true),
        (lock_path(&target, ".info.json"), false),
        (target, true),
    ] {
        let existed = match tokio::fs::metadata(&path).await {
            Ok(metadata) if is_claim && metadata.is_dir() => remove_dir_if_exists(&path).await?,
            Ok(_) => remove_file_if_exists(&path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if existed {
            tracing::debug!(path = %path.display(), "cleared");
            removed.push(path);
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwlockfile::{AcquireOptions, LockType, Lockfile, RwLockfile};
    use tempfile::TempDir;

    #[tokio::test]
    async fn refuses_without_force() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        let lock = Lockfile::new(&base);
        lock.lock().await.unwrap();

        let err = cmd_clear(ClearArgs {
            base: base.clone(),
            force: false,
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert!(lock.path().is_dir());
        lock.unlock().await.unwrap();
    }

    #[tokio::test]
    async fn clears_a_mutex_claim() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        let holder = Lockfile::new(&base);
        holder.lock().await.unwrap();

        let removed = clear_files(&base).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!holder.path().exists());
        assert!(!holder.info_path().exists());

        let other = Lockfile::new(&base);
        assert!(other.check().await.unwrap());
    }

    #[tokio::test]
    async fn clears_rw_state() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("db");
        let holder = RwLockfile::new(&base);
        holder
            .add(LockType::Write, AcquireOptions::new())
            .await
            .unwrap();
        assert!(holder.path().is_file());

        let removed = clear_files(&base).await.unwrap();
        assert_eq!(removed, vec![holder.path().to_path_buf()]);

        let other = RwLockfile::new(&base);
        assert!(other.check(LockType::Write).await.unwrap().is_open());
    }

    #[tokio::test]
    async fn clears_nothing_when_unused() {
        let dir = TempDir::new().unwrap();
        let removed = clear_files(&dir.path().join("db")).await.unwrap();
        assert!(removed.is_empty());
    }
}
