use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};

/// Scratch directory for one launch, named by a fresh UUID under the extract root.
///
/// Call [`ExtractDir::cleanup`] once the game has exited. If the value is
/// dropped without that (the launch driver panicked or was aborted), the
/// directory is removed synchronously as a fallback.
#[derive(Debug)]
pub struct ExtractDir {
    path: PathBuf,
    armed: bool,
}

impl ExtractDir {
    pub async fn create(root: &Path) -> LauncherResult<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        debug!("Created extract directory {:?}", path);
        Ok(Self { path, armed: true })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it. Failures are logged, never raised.
    pub async fn cleanup(mut self) -> bool {
        self.armed = false;
        info!("Process ended; cleaning up {:?}", self.path);
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to clean up {:?}: {}", self.path, e);
                false
            }
        }
    }
}

impl Drop for ExtractDir {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up {:?}: {}", self.path, e),
        }
    }
}
