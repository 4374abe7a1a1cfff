use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::core::error::{LauncherError, LauncherResult};

/// Recursively delete `root`, stopping with `Cancelled` as soon as `token`
/// fires.
///
/// Entries already removed stay removed, so re-running on a half-deleted
/// tree finishes the job. A missing `root` is not an error. Symlinks are
/// removed, never followed.
pub async fn interruptible_delete(root: &Path, token: &CancellationToken) -> LauncherResult<()> {
    let metadata = match tokio::fs::symlink_metadata(root).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(LauncherError::io(root, e)),
    };
    if !metadata.is_dir() {
        return remove_file(root).await;
    }

    let mut pending = vec![root.to_path_buf()];
    let mut visited: Vec<PathBuf> = Vec::new();

    while let Some(dir) = pending.pop() {
        checkpoint(token)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(LauncherError::io(&dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&dir, e))?
        {
            checkpoint(token)?;

            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| LauncherError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else {
                remove_file(&path).await?;
            }
        }

        visited.push(dir);
    }

    // Children were visited after their parents.
    for dir in visited.into_iter().rev() {
        checkpoint(token)?;
        match tokio::fs::remove_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(LauncherError::io(&dir, e)),
        }
    }

    Ok(())
}

fn checkpoint(token: &CancellationToken) -> LauncherResult<()> {
    if token.is_cancelled() {
        Err(LauncherError::Cancelled)
    } else {
        Ok(())
    }
}

async fn remove_file(path: &Path) -> LauncherResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LauncherError::io(path, e)),
    }
}
