use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::model::{Instance, INSTANCE_FILE};
use crate::core::error::{LauncherError, LauncherResult};

/// Persistence for per-instance metadata.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Load the metadata kept in `dir`.
    ///
    /// Missing or unreadable metadata yields a default instance; the returned
    /// value always has `dir` set.
    async fn load(&self, dir: &Path) -> Instance;

    /// Persist the instance's durable fields.
    async fn commit(&self, instance: &Instance) -> LauncherResult<()>;
}

/// Stores each instance as pretty-printed `instance.json` in its directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonInstanceStore;

#[async_trait]
impl InstanceStore for JsonInstanceStore {
    async fn load(&self, dir: &Path) -> Instance {
        let config_path = dir.join(INSTANCE_FILE);

        let mut instance = match tokio::fs::read_to_string(&config_path).await {
            Ok(json) => match serde_json::from_str::<Instance>(&json) {
                Ok(instance) => instance,
                Err(e) => {
                    warn!("Corrupt {:?}, using defaults: {}", config_path, e);
                    Instance::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Instance::default(),
            Err(e) => {
                warn!("Cannot read {:?}, using defaults: {}", config_path, e);
                Instance::default()
            }
        };

        instance.dir = dir.to_path_buf();
        instance
    }

    async fn commit(&self, instance: &Instance) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(instance)?;
        let config_path = instance.config_path();

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        tokio::fs::write(&config_path, json)
            .await
            .map_err(|e| LauncherError::io(&config_path, e))?;

        debug!("Persisted {} to {:?}", instance.name, config_path);
        Ok(())
    }
}
