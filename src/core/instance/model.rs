use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Name of the metadata file inside every instance directory.
pub const INSTANCE_FILE: &str = "instance.json";

/// A named, versioned content bundle that can be installed and launched.
///
/// Each instance has its own folder under `instances/<name>/` with:
/// - `instance.json`    : the persisted part of this struct
/// - `minecraft/`       : content root (holds `config/` and `mods/`)
/// - `update_cache.json`: updater bookkeeping, discarded on reset
///
/// `dir`, `manifest_url`, `local` and `selected` are runtime state filled in
/// by the reconciler and never written to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    /// Stable identifier; equals the directory name. Compared case-insensitively.
    pub name: String,
    pub title: Option<String>,
    /// Opaque version tag, only ever compared for equality.
    pub version: Option<String>,
    pub priority: i32,
    pub installed: bool,
    pub update_pending: bool,
    pub last_accessed: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub dir: PathBuf,
    #[serde(skip)]
    pub manifest_url: Option<Url>,
    #[serde(skip)]
    pub local: bool,
    #[serde(skip)]
    pub selected: bool,
}

impl Instance {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Display title, falling back to the identifier.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title,
            _ => &self.name,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Path to the content root the game runs in.
    pub fn content_dir(&self) -> PathBuf {
        self.dir.join("minecraft")
    }

    /// Path to the `config/` directory.
    pub fn config_dir(&self) -> PathBuf {
        self.content_dir().join("config")
    }

    /// Path to the `mods/` directory.
    pub fn mods_dir(&self) -> PathBuf {
        self.content_dir().join("mods")
    }

    /// Path to this instance's metadata file.
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(INSTANCE_FILE)
    }

    pub fn update_cache_path(&self) -> PathBuf {
        self.dir.join("update_cache.json")
    }
}

/// Catalog order: higher priority first, then title, then identifier.
pub fn catalog_order(a: &Instance, b: &Instance) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| {
            a.display_title()
                .to_lowercase()
                .cmp(&b.display_title().to_lowercase())
        })
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}
