use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::core::auth::OfflineAuthProvider;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::instance::{
    Catalog, HttpManifestFetcher, Instance, InstanceReconciler, InstanceStore, JsonInstanceStore,
};
use crate::core::launch::{ChildProcessWatcher, CommandRunner, LaunchServices, LaunchSupervisor};
use crate::core::task::{Executor, WorkerPool};
use crate::core::update::{InstanceResetter, ManifestUpdater};

const APP_DIR_NAME: &str = "PackLauncher";
const SETTINGS_FILE: &str = "launcher_settings.json";
/// Overrides the data directory, mostly for portable installs and tests.
pub const DATA_DIR_ENV: &str = "PACKLAUNCHER_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Remote package list; manifest locations are resolved against it.
    pub packages_url: String,
    /// Player name used for offline logins. `None` means login is declined.
    pub offline_username: Option<String>,
    /// Program followed by its arguments, with `${...}` placeholders.
    pub game_command: Vec<String>,
    pub max_concurrent_tasks: usize,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            packages_url: "http://localhost:8080/packages.json".into(),
            offline_username: None,
            game_command: [
                "java",
                "-Djava.io.tmpdir=${extract_directory}",
                "-jar",
                "${instance_dir}/game.jar",
                "--username",
                "${auth_player_name}",
                "--uuid",
                "${auth_uuid}",
                "--accessToken",
                "${auth_access_token}",
                "--gameDir",
                "${game_directory}",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .collect(),
            max_concurrent_tasks: 4,
        }
    }
}

/// Everything the launcher front end needs, wired from the data directory.
pub struct LauncherState {
    pub data_dir: PathBuf,
    pub settings: LauncherSettings,
    pub http_client: Client,
    pub store: Arc<dyn InstanceStore>,
    pub catalog: Arc<Catalog>,
    pub pool: WorkerPool,
}

impl LauncherState {
    /// Open the default data directory. Must run inside a tokio runtime.
    pub fn load() -> LauncherResult<Self> {
        Self::open(default_data_dir())
    }

    pub fn open(data_dir: PathBuf) -> LauncherResult<Self> {
        std::fs::create_dir_all(&data_dir).map_err(|e| LauncherError::io(&data_dir, e))?;
        let settings = load_settings_from_disk(&data_dir).unwrap_or_default();
        debug!("Using data directory {:?}", data_dir);

        let handle = Handle::try_current()
            .map_err(|e| LauncherError::Other(format!("No async runtime available: {e}")))?;
        let pool = WorkerPool::new(handle, settings.max_concurrent_tasks);

        Ok(Self {
            data_dir,
            settings,
            http_client: build_http_client()?,
            store: Arc::new(JsonInstanceStore),
            catalog: Arc::new(Catalog::new()),
            pool,
        })
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    /// Root of the per-launch scratch directories.
    pub fn extract_dir(&self) -> PathBuf {
        self.data_dir.join("temp").join("extract")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn save_settings(&self) -> LauncherResult<()> {
        let path = self.settings_path();
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
    }

    pub fn reconciler(&self) -> LauncherResult<InstanceReconciler> {
        let packages_url =
            Url::parse(&self.settings.packages_url).map_err(|e| LauncherError::InvalidUrl {
                url: self.settings.packages_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(InstanceReconciler::new(
            self.instances_dir(),
            packages_url,
            Arc::new(HttpManifestFetcher::new(self.http_client.clone())),
            self.store.clone(),
        ))
    }

    pub fn resetter(&self, instance: Instance) -> InstanceResetter {
        InstanceResetter::new(instance, self.store.clone())
    }

    /// Supervisor using the default collaborators, reporting on `ui`.
    pub fn launch_supervisor(&self, ui: Arc<dyn Executor>) -> LauncherResult<LaunchSupervisor> {
        let services = LaunchServices {
            store: self.store.clone(),
            auth: Arc::new(OfflineAuthProvider::new(
                self.settings.offline_username.clone(),
            )),
            updater: Arc::new(ManifestUpdater::new(
                self.http_client.clone(),
                self.store.clone(),
            )),
            runner: Arc::new(CommandRunner::from_command_line(&self.settings.game_command)?),
            watcher: Arc::new(ChildProcessWatcher),
        };

        Ok(LaunchSupervisor::new(
            self.pool.clone(),
            ui,
            services,
            self.extract_dir(),
        ))
    }
}

fn load_settings_from_disk(data_dir: &Path) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring unreadable settings {:?}: {}", path, e);
            None
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
