// ─── Instance Reconciliation ───
// Merges instances found on disk with the remote package list into the catalog.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Url;
use tracing::{info, warn};

use super::catalog::Catalog;
use super::manifest::{resolve_location, ManifestFetcher, ManifestInfo, PROTOCOL_VERSION};
use super::model::Instance;
use super::store::InstanceStore;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::task::{ObservableTask, TaskContext, WorkerPool};

pub const STATUS_LOADING_LOCAL: &str = "Loading local instances...";
pub const STATUS_CHECKING_REMOTE: &str = "Checking for remote instances...";

/// Builds the catalog from the instances directory and the remote package list.
#[derive(Clone)]
pub struct InstanceReconciler {
    instances_dir: PathBuf,
    packages_url: Url,
    fetcher: Arc<dyn ManifestFetcher>,
    store: Arc<dyn InstanceStore>,
}

impl InstanceReconciler {
    pub fn new(
        instances_dir: PathBuf,
        packages_url: Url,
        fetcher: Arc<dyn ManifestFetcher>,
        store: Arc<dyn InstanceStore>,
    ) -> Self {
        Self {
            instances_dir,
            packages_url,
            fetcher,
            store,
        }
    }

    /// Start a reconciliation of `catalog` on the pool.
    ///
    /// The catalog is replaced as a whole when the scan finished, even if the
    /// remote list could not be merged; only a protocol mismatch (or a failed
    /// local scan) leaves it untouched.
    pub fn reconcile(&self, catalog: Arc<Catalog>, pool: &WorkerPool) -> ObservableTask<Arc<Catalog>> {
        let reconciler = self.clone();
        ObservableTask::spawn(pool, move |ctx| async move {
            reconciler.run(&catalog, &ctx).await?;
            Ok(catalog)
        })
    }

    async fn run(&self, catalog: &Catalog, ctx: &TaskContext) -> LauncherResult<()> {
        info!("Enumerating instance list...");
        ctx.progress().set(0.0, STATUS_LOADING_LOCAL);

        let mut local = self.scan_local(ctx).await?;

        ctx.progress().set(0.3, STATUS_CHECKING_REMOTE);

        let mut remote = Vec::new();
        let merged = self.merge_remote(&mut local, &mut remote, ctx).await;
        if let Err(e) = &merged {
            if e.is_fatal() {
                warn!("Package list rejected this launcher: {}", e);
                return merged;
            }
        }

        local.append(&mut remote);
        let count = catalog.replace(local);
        info!("{} instance(s) enumerated.", count);

        ctx.progress().set_indeterminate();
        merged
    }

    async fn scan_local(&self, ctx: &TaskContext) -> LauncherResult<Vec<Instance>> {
        let mut local = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.instances_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(local),
            Err(e) => return Err(LauncherError::io(&self.instances_dir, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?
        {
            ctx.checkpoint()?;

            let dir = entry.path();
            let is_dir = tokio::fs::metadata(&dir)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let mut instance = self.store.load(&dir).await;
            instance.name = entry.file_name().to_string_lossy().into_owned();
            instance.selected = true;
            instance.local = true;

            info!("{} local instance found at {:?}", instance.name, dir);
            local.push(instance);
        }

        local.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(local)
    }

    async fn merge_remote(
        &self,
        local: &mut [Instance],
        remote: &mut Vec<Instance>,
        ctx: &TaskContext,
    ) -> LauncherResult<()> {
        let packages = self
            .fetcher
            .fetch(&self.packages_url)
            .await
            .map_err(|e| LauncherError::ManifestUnavailable(Box::new(e)))?;

        if packages.requires_newer_launcher(PROTOCOL_VERSION) {
            return Err(LauncherError::UpdateRequired {
                required: packages.minimum_version,
                supported: PROTOCOL_VERSION,
            });
        }

        for manifest in &packages.packages {
            ctx.checkpoint()?;
            let manifest_url = self.manifest_url(manifest);

            let mut found_local = false;
            for instance in local.iter_mut().filter(|i| i.is_named(&manifest.name)) {
                found_local = true;
                self.merge_into_local(instance, manifest, manifest_url.clone())
                    .await;
            }

            if found_local {
                continue;
            }
            if remote.iter().any(|i| i.is_named(&manifest.name)) {
                warn!("Package list declares {} more than once", manifest.name);
                continue;
            }

            let instance = self.synthesize_remote(manifest, manifest_url).await;
            info!(
                "Available remote instance: '{}' at version {:?}",
                instance.name, instance.version
            );
            remote.push(instance);
        }

        Ok(())
    }

    async fn merge_into_local(
        &self,
        instance: &mut Instance,
        manifest: &ManifestInfo,
        manifest_url: Option<Url>,
    ) {
        instance.title = manifest.title.clone();
        instance.priority = manifest.priority;
        instance.manifest_url = manifest_url;

        if instance.version.as_deref() != Some(manifest.version.as_str()) {
            instance.update_pending = true;
            instance.version = Some(manifest.version.clone());
            if let Err(e) = self.store.commit(instance).await {
                warn!("Cannot persist pending update for {}: {}", instance.name, e);
            }
            info!("{} requires an update to {}", instance.name, manifest.version);
        }
    }

    async fn synthesize_remote(&self, manifest: &ManifestInfo, manifest_url: Option<Url>) -> Instance {
        let dir = self.instances_dir.join(&manifest.name);
        let mut instance = self.store.load(&dir).await;
        instance.name = manifest.name.clone();
        instance.title = manifest.title.clone();
        instance.version = Some(manifest.version.clone());
        instance.priority = manifest.priority;
        instance.manifest_url = manifest_url;
        instance.selected = false;
        instance.update_pending = true;
        instance.local = false;
        instance
    }

    fn manifest_url(&self, manifest: &ManifestInfo) -> Option<Url> {
        match resolve_location(&self.packages_url, &manifest.location) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Ignoring manifest location of {}: {}", manifest.name, e);
                None
            }
        }
    }
}
