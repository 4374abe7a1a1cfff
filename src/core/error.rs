use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Response from {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: u64 },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // ── Manifest ────────────────────────────────────────
    /// The server requires a newer launcher. Never recoverable.
    #[error("Update required: the package list needs protocol {required}, this launcher speaks {supported}")]
    UpdateRequired { required: u32, supported: u32 },

    #[error("The list of modpacks could not be downloaded: {0}")]
    ManifestUnavailable(#[source] Box<LauncherError>),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Instance ────────────────────────────────────────
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Instance {0} is not installed and cannot be updated offline")]
    OfflineInstall(String),

    // ── Launch ──────────────────────────────────────────
    #[error("Failed to start game process: {0}")]
    LaunchFailed(String),

    #[error("Game process exited with {}", exit_code_label(.code))]
    ProcessExited { code: Option<i32> },

    // ── Tasks ───────────────────────────────────────────
    #[error("Task was cancelled")]
    Cancelled,

    #[error("Task panicked or was aborted: {0}")]
    TaskJoin(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// Error as delivered to task continuations; several subscribers may hold it.
pub type SharedError = Arc<LauncherError>;

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    /// Fatal errors must not be retried; the user has to upgrade the launcher.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LauncherError::UpdateRequired { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LauncherError::Cancelled)
    }
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated externally)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_protocol_mismatch_is_fatal() {
        let fatal = LauncherError::UpdateRequired {
            required: 3,
            supported: 2,
        };
        assert!(fatal.is_fatal());

        let transport = LauncherError::ManifestUnavailable(Box::new(LauncherError::DownloadFailed {
            url: "https://example.com/packages.json".into(),
            status: 503,
        }));
        assert!(!transport.is_fatal());
        assert!(transport.to_string().contains("could not be downloaded"));
    }

    #[test]
    fn process_exit_message_mentions_code() {
        let err = LauncherError::ProcessExited { code: Some(1) };
        assert_eq!(err.to_string(), "Game process exited with code 1");

        let err = LauncherError::ProcessExited { code: None };
        assert!(err.to_string().contains("terminated externally"));
    }
}
