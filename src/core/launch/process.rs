use async_trait::async_trait;
use tracing::{error, info};

use super::runner::RunningProcess;
use crate::core::error::{LauncherError, LauncherResult};

/// Waits for a started game to exit.
#[async_trait]
pub trait ProcessWatcher: Send + Sync {
    /// Resolves when the process is gone; an abnormal exit is an error.
    async fn watch(&self, process: RunningProcess) -> LauncherResult<()>;
}

/// Watches a child process spawned by this launcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildProcessWatcher;

#[async_trait]
impl ProcessWatcher for ChildProcessWatcher {
    async fn watch(&self, process: RunningProcess) -> LauncherResult<()> {
        let Some(mut child) = process.take_child().await else {
            return Err(LauncherError::Other(format!(
                "No process handle to watch (PID {:?})",
                process.pid()
            )));
        };

        let status = child.wait().await?;
        if status.success() {
            info!("Game process {:?} exited normally", process.pid());
            Ok(())
        } else {
            error!(
                "Game process {:?} exited with status: {:?}",
                process.pid(),
                status
            );
            Err(LauncherError::ProcessExited {
                code: status.code(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn spawn_sh(script: &str) -> RunningProcess {
        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(script)
            .spawn()
            .unwrap();
        RunningProcess::from_child(child)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_is_ok() {
        ChildProcessWatcher.watch(spawn_sh("exit 0")).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let err = ChildProcessWatcher
            .watch(spawn_sh("exit 3"))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::ProcessExited { code: Some(3) }));
    }

    #[tokio::test]
    async fn detached_process_cannot_be_watched() {
        let err = ChildProcessWatcher
            .watch(RunningProcess::detached(Some(42)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("42"));
    }
}
