// ─── Instance Updater ───
// Brings an instance's files up to date with its remote manifest.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{Instance, InstanceStore};
use crate::core::task::{ObservableTask, TaskContext, WorkerPool};

/// Largest manifest body accepted from a server.
pub const MAX_MANIFEST_BYTES: u64 = 16 * 1024 * 1024;

/// Produces the update task for an instance.
///
/// `online` tells the updater whether it may reach the network; an offline
/// update can only reuse what is already installed.
pub trait InstanceUpdater: Send + Sync {
    fn update(&self, instance: Instance, online: bool, pool: &WorkerPool) -> ObservableTask<Instance>;
}

#[derive(Debug, Serialize)]
struct UpdateCache<'a> {
    version: Option<&'a str>,
    manifest_url: &'a str,
    updated_at: chrono::DateTime<Utc>,
}

/// Minimal updater: mirrors the instance manifest into the instance
/// directory and records the installed version.
#[derive(Clone)]
pub struct ManifestUpdater {
    client: Client,
    store: Arc<dyn InstanceStore>,
    max_manifest_bytes: u64,
}

impl ManifestUpdater {
    pub fn new(client: Client, store: Arc<dyn InstanceStore>) -> Self {
        Self {
            client,
            store,
            max_manifest_bytes: MAX_MANIFEST_BYTES,
        }
    }

    async fn run(&self, mut instance: Instance, online: bool, ctx: &TaskContext) -> LauncherResult<Instance> {
        ctx.progress()
            .set(0.0, format!("Updating {}", instance.display_title()));

        if !online {
            if !instance.installed {
                return Err(LauncherError::OfflineInstall(instance.name.clone()));
            }
            info!("Offline; keeping installed files of {}", instance.name);
            ctx.progress().set(1.0, "Using installed files");
            return Ok(instance);
        }

        let Some(manifest_url) = instance.manifest_url.clone() else {
            if instance.installed {
                info!("{} has no remote manifest; nothing to update", instance.name);
                return Ok(instance);
            }
            return Err(LauncherError::Other(format!(
                "{} has no manifest location and cannot be installed",
                instance.name
            )));
        };

        ctx.progress().set(0.1, "Downloading manifest");
        let response = self.client.get(manifest_url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(LauncherError::DownloadFailed {
                url: manifest_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let limit = self.max_manifest_bytes;
        let too_large = || LauncherError::ResponseTooLarge {
            url: manifest_url.to_string(),
            limit,
        };
        let total = response.content_length();
        if total.is_some_and(|t| t > limit) {
            return Err(too_large());
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            ctx.checkpoint()?;
            let chunk = chunk?;
            if (bytes.len() + chunk.len()) as u64 > limit {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
            if let Some(total) = total.filter(|t| *t > 0) {
                let done = bytes.len() as f64 / total as f64;
                ctx.progress().set_fraction(0.1 + 0.6 * done);
            }
        }
        ctx.checkpoint()?;

        ctx.progress().set(0.7, "Installing");
        let content_dir = instance.content_dir();
        tokio::fs::create_dir_all(&content_dir)
            .await
            .map_err(|e| LauncherError::io(&content_dir, e))?;

        let manifest_path = instance.dir.join("manifest.json");
        tokio::fs::write(&manifest_path, &bytes)
            .await
            .map_err(|e| LauncherError::io(&manifest_path, e))?;

        let cache = UpdateCache {
            version: instance.version.as_deref(),
            manifest_url: manifest_url.as_str(),
            updated_at: Utc::now(),
        };
        let cache_path = instance.update_cache_path();
        tokio::fs::write(&cache_path, serde_json::to_string_pretty(&cache)?)
            .await
            .map_err(|e| LauncherError::io(&cache_path, e))?;

        instance.installed = true;
        instance.update_pending = false;
        instance.local = true;
        self.store.commit(&instance).await?;

        info!("{} updated to {:?}", instance.name, instance.version);
        ctx.progress().set(1.0, "Update finished");
        Ok(instance)
    }
}

impl InstanceUpdater for ManifestUpdater {
    fn update(&self, instance: Instance, online: bool, pool: &WorkerPool) -> ObservableTask<Instance> {
        let updater = self.clone();
        ObservableTask::spawn(pool, move |ctx| async move {
            updater.run(instance, online, &ctx).await
        })
    }
}
