// ─── Instance Reset ───
// Forgets an instance's installed state and wipes its user-modifiable content.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::fs::interruptible_delete;
use crate::core::instance::{Instance, InstanceStore};
use crate::core::task::{ObservableTask, TaskContext, WorkerPool};

type CurrentDir = Arc<Mutex<Option<PathBuf>>>;

/// Hard reset of one instance.
///
/// The installed/pending flags are persisted before anything is deleted, so
/// an interrupted reset still forces a full reinstall on next launch.
/// Running it again on a half-cleaned instance is safe.
#[derive(Clone)]
pub struct InstanceResetter {
    instance: Instance,
    store: Arc<dyn InstanceStore>,
    current_dir: CurrentDir,
}

impl InstanceResetter {
    pub fn new(instance: Instance, store: Arc<dyn InstanceStore>) -> Self {
        Self {
            instance,
            store,
            current_dir: Arc::new(Mutex::new(None)),
        }
    }

    /// Directory being removed right now, if any.
    pub fn current_dir(&self) -> Option<PathBuf> {
        self.current_dir
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Human readable description of the current step.
    pub fn describe(&self) -> String {
        match self.current_dir() {
            Some(dir) => format!("Removing {}", dir.display()),
            None => "Working...".to_string(),
        }
    }

    pub fn reset(&self, pool: &WorkerPool) -> ObservableTask<Instance> {
        let resetter = self.clone();
        ObservableTask::spawn(pool, move |ctx| async move { resetter.run(&ctx).await })
    }

    async fn run(&self, ctx: &TaskContext) -> LauncherResult<Instance> {
        let mut instance = self.instance.clone();
        ctx.progress()
            .set_status(format!("Resetting {}", instance.display_title()));

        instance.installed = false;
        instance.update_pending = true;
        self.store.commit(&instance).await?;
        info!("Reset {}: marked for reinstall", instance.name);

        let cache = instance.update_cache_path();
        if let Err(e) = tokio::fs::remove_file(&cache).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Cannot remove {:?}: {}", cache, e);
            }
        }

        for dir in [instance.config_dir(), instance.mods_dir()] {
            match self.remove_dir(&dir, ctx).await {
                Ok(()) => {}
                Err(LauncherError::Cancelled) => {
                    info!("Reset of {} interrupted", instance.name);
                    return Err(LauncherError::Cancelled);
                }
                Err(e) => warn!("Failed to remove {:?}: {}", dir, e),
            }
        }

        ctx.progress()
            .set_status(format!("Resetting {}", instance.display_title()));
        Ok(instance)
    }

    async fn remove_dir(&self, dir: &Path, ctx: &TaskContext) -> LauncherResult<()> {
        if !tokio::fs::metadata(dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Ok(());
        }

        let _target = CurrentDirGuard::set(&self.current_dir, dir);
        ctx.progress().set_status(self.describe());
        interruptible_delete(dir, ctx.token()).await
    }
}

/// Publishes the targeted directory and clears it however removal ends.
struct CurrentDirGuard<'a> {
    slot: &'a Mutex<Option<PathBuf>>,
}

impl<'a> CurrentDirGuard<'a> {
    fn set(slot: &'a Mutex<Option<PathBuf>>, dir: &Path) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(dir.to_path_buf());
        Self { slot }
    }
}

impl Drop for CurrentDirGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
