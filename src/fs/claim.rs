//! Claim directory primitives: exclusive create, heartbeat mtime, removal.

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Append `suffix` to `base` (without treating it as an extension) and make
/// the result absolute.
///
/// `lock_path("tmp/a", ".lock")` is `<cwd>/tmp/a.lock`.
pub fn lock_path(base: &Path, suffix: &str) -> PathBuf {
    let mut raw = base.as_os_str().to_os_string();
    raw.push(suffix);
    let path = PathBuf::from(raw);
    std::path::absolute(&path).unwrap_or(path)
}

/// Whether a failed claim creation means "somebody else holds it".
pub fn is_contended(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::AlreadyExists => true,
        // A directory pending deletion on Windows reports access denied.
        io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => false,
    }
}

/// Create the parent directories, then create `path` exclusively.
pub async fn create_claim_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::create_dir(path).await
}

/// Blocking twin of [`create_claim_dir`].
pub fn create_claim_dir_sync(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir(path)
}

/// Modification time of `path`, or `None` when it does not exist.
pub async fn mtime(path: &Path) -> io::Result<Option<SystemTime>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Blocking twin of [`mtime`].
pub fn mtime_sync(path: &Path) -> io::Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => meta.modified().map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Set both access and modification time of a file or directory.
pub fn touch_sync(path: &Path, time: SystemTime) -> io::Result<()> {
    let handle = open_for_times(path)?;
    handle.set_times(FileTimes::new().set_accessed(time).set_modified(time))
}

#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    // Directories can only be opened with backup semantics.
    const FILE_FLAG_BACKUP_SEMANTICS: u32 = 0x0200_0000;
    fs::OpenOptions::new()
        .write(true)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS)
        .open(path)
}

/// Recursively remove a claim directory. Returns `false` if it was already gone.
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Blocking twin of [`remove_dir_if_exists`].
pub fn remove_dir_if_exists_sync(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a file. Returns `false` if it was already gone.
pub async fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Blocking twin of [`remove_file_if_exists`].
pub fn remove_file_if_exists_sync(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
