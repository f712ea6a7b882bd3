//! JSON documents on disk: owner info files and read/write state.

use super::atomic::{atomic_write, atomic_write_sync};
use crate::error::{LockfileError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::Path;

/// Read and parse a JSON document. `Ok(None)` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => parse(path, &bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Blocking twin of [`read_json`].
pub fn read_json_sync<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => parse(path, &bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Serialize `value` as pretty JSON and write it atomically.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    atomic_write(path, &bytes).await?;
    Ok(())
}

/// Blocking twin of [`write_json`].
pub fn write_json_sync<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    atomic_write_sync(path, &bytes)?;
    Ok(())
}

fn parse<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| LockfileError::corrupt_state(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let doc: Option<Doc> = read_json_sync(&dir.path().join("nope.json")).unwrap();
        assert!(doc.is_none());
    }

    #[test]
    fn malformed_file_is_corrupt_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.lock");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_json_sync::<Doc>(&path).unwrap_err();
        assert!(matches!(err, LockfileError::CorruptState { .. }));
        assert!(err.to_string().contains("bad.lock"));
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("doc.json");
        let doc = Doc {
            name: "reader".to_string(),
        };

        write_json(&path, &doc).await.unwrap();
        let back: Option<Doc> = read_json(&path).await.unwrap();
        assert_eq!(back, Some(doc));
    }
}
