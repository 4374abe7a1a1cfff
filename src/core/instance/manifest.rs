// ─── Package List ───
// The remote list of available instances and how to fetch it.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

/// Package list protocol understood by this build.
pub const PROTOCOL_VERSION: u32 = 2;

/// Top-level remote package list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageList {
    /// Oldest launcher protocol able to read this list.
    #[serde(default)]
    pub minimum_version: u32,
    #[serde(default)]
    pub packages: Vec<ManifestInfo>,
}

/// A single available instance as declared by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestInfo {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub version: String,
    #[serde(default)]
    pub priority: i32,
    /// Manifest location, relative to the package list URL.
    pub location: String,
}

impl PackageList {
    pub fn requires_newer_launcher(&self, supported: u32) -> bool {
        self.minimum_version > supported
    }
}

/// Resolve a package's manifest location against the package list URL.
pub fn resolve_location(base: &Url, location: &str) -> LauncherResult<Url> {
    base.join(location).map_err(|e| LauncherError::InvalidUrl {
        url: location.to_string(),
        reason: e.to_string(),
    })
}

/// Source of the remote package list.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> LauncherResult<PackageList>;
}

/// Fetches the package list over HTTP using a shared client.
#[derive(Debug, Clone)]
pub struct HttpManifestFetcher {
    client: Client,
}

impl HttpManifestFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, url: &Url) -> LauncherResult<PackageList> {
        info!("Fetching package list from {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let packages: PackageList = response.json().await?;
        info!(
            "Loaded {} packages (minimum protocol {})",
            packages.packages.len(),
            packages.minimum_version
        );
        Ok(packages)
    }
}
