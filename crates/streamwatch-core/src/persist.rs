//! Atomic JSON files with a backup copy
//!
//! Shared by the file snapshot store and the file event bus. A write goes to
//! `<path>.tmp`, is synced, the current file is copied to `<path>.backup`,
//! then the temp file is renamed over `<path>`. A crash at any point leaves
//! either the old or the new file in place.
//!
//! On load a missing file is `None`. A file that does not parse is treated
//! as corrupt and the backup is tried; when the backup is unusable as well
//! the caller starts empty.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// Why a file could not be loaded
#[derive(Debug)]
enum LoadError {
    /// Unreadable (permissions, I/O)
    Io(std::io::Error),
    /// Readable but not the expected shape
    Corrupt(serde_json::Error),
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

pub(crate) fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("backup")
}

/// Create the parent directory of `path` if it has one
pub(crate) async fn ensure_parent(path: &Path, fail: fn(String) -> Error) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await.map_err(|e| {
            fail(format!("failed to create directory {}: {}", parent.display(), e))
        })?;
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LoadError> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LoadError::Io(e)),
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(LoadError::Corrupt)
}

/// Load `path`, falling back to its backup when it is corrupt
///
/// `Ok(None)` means "start empty". Only an unreadable file is an error.
pub(crate) async fn load_with_recovery<T: DeserializeOwned>(
    path: &Path,
    fail: fn(String) -> Error,
) -> Result<Option<T>, Error> {
    match read_json(path).await {
        Ok(value) => Ok(value),
        Err(LoadError::Io(e)) => Err(fail(format!("failed to read {}: {}", path.display(), e))),
        Err(LoadError::Corrupt(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "File is corrupt, trying backup");

            let backup = backup_path(path);
            match read_json::<T>(&backup).await {
                Ok(Some(value)) => {
                    tracing::info!(backup = %backup.display(), "Recovered state from backup");
                    if let Err(e) = fs::copy(&backup, path).await {
                        tracing::error!(error = %e, "Failed to restore file from backup");
                    }
                    Ok(Some(value))
                }
                Ok(None) => {
                    tracing::warn!(path = %path.display(), "No backup found, starting empty");
                    Ok(None)
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Backup unusable, starting empty");
                    Ok(None)
                }
            }
        }
    }
}

/// Replace `path` with `value` via temp file + rename
pub(crate) async fn write_atomic<T: Serialize>(
    path: &Path,
    value: &T,
    fail: fn(String) -> Error,
) -> Result<(), Error> {
    let json = serde_json::to_vec_pretty(value)?;

    let temp = temp_path(path);
    let mut file = fs::File::create(&temp)
        .await
        .map_err(|e| fail(format!("failed to create {}: {}", temp.display(), e)))?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    if fs::try_exists(path).await.unwrap_or(false)
        && let Err(e) = fs::copy(path, backup_path(path)).await
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to write backup");
    }

    fs::rename(&temp, path).await.map_err(|e| {
        fail(format!(
            "failed to move {} into place at {}: {}",
            temp.display(),
            path.display(),
            e
        ))
    })?;

    tracing::trace!(path = %path.display(), "File committed");
    Ok(())
}
