// ─── Game Runner ───
// Spawns the game process for an instance with the configured command line.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::core::auth::Session;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;
use crate::core::task::{ObservableTask, WorkerPool};

/// Environment variable pointing the game at its per-launch scratch directory.
pub const EXTRACT_DIR_ENV: &str = "PACKLAUNCHER_EXTRACT_DIR";

/// Handle to a started game process.
///
/// Cloning shares the handle; the first watcher to take the child owns it.
#[derive(Debug, Clone)]
pub struct RunningProcess {
    pid: Option<u32>,
    child: Arc<Mutex<Option<Child>>>,
}

impl RunningProcess {
    pub fn from_child(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Arc::new(Mutex::new(Some(child))),
        }
    }

    /// A process the launcher does not own a handle for.
    pub fn detached(pid: Option<u32>) -> Self {
        Self {
            pid,
            child: Arc::new(Mutex::new(None)),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub(crate) async fn take_child(&self) -> Option<Child> {
        self.child.lock().await.take()
    }
}

/// Starts the game for an authenticated session.
pub trait GameRunner: Send + Sync {
    fn start(
        &self,
        instance: &Instance,
        session: &Session,
        extract_dir: &Path,
        pool: &WorkerPool,
    ) -> ObservableTask<RunningProcess>;
}

/// Runs a configured command line, substituting `${...}` placeholders.
///
/// Known placeholders: `instance_name`, `instance_title`, `instance_version`,
/// `instance_dir`, `game_directory`, `extract_directory`, `auth_player_name`,
/// `auth_uuid`, `auth_access_token`, `user_type`. An argument that still holds
/// a placeholder after substitution is dropped together with the option
/// right before it.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a `[program, args...]` list as stored in the settings.
    pub fn from_command_line(command: &[String]) -> LauncherResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| LauncherError::LaunchFailed("No game command configured".into()))?;
        if program.trim().is_empty() {
            return Err(LauncherError::LaunchFailed("Game command has an empty program".into()));
        }
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    fn build_command(&self, instance: &Instance, session: &Session, extract_dir: &Path) -> Command {
        let content_dir = instance.content_dir();
        let vars = [
            ("instance_name", instance.name.clone()),
            ("instance_title", instance.display_title().to_string()),
            ("instance_version", instance.version.clone().unwrap_or_default()),
            ("instance_dir", path_str(&instance.dir)),
            ("game_directory", path_str(&content_dir)),
            ("extract_directory", path_str(extract_dir)),
            ("auth_player_name", session.username.clone()),
            ("auth_uuid", session.uuid.clone()),
            ("auth_access_token", session.access_token.clone()),
            ("user_type", session.user_type.clone()),
        ];

        let mut cmd = Command::new(&self.program);
        cmd.args(resolve_args(&self.args, &vars));
        cmd.current_dir(&content_dir);
        cmd.env(EXTRACT_DIR_ENV, extract_dir);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl GameRunner for CommandRunner {
    fn start(
        &self,
        instance: &Instance,
        session: &Session,
        extract_dir: &Path,
        pool: &WorkerPool,
    ) -> ObservableTask<RunningProcess> {
        let mut cmd = self.build_command(instance, session, extract_dir);
        let content_dir = instance.content_dir();
        let label = instance.name.clone();
        let title = instance.display_title().to_string();

        ObservableTask::spawn(pool, move |ctx| async move {
            ctx.progress().set(0.0, format!("Launching {title}"));
            ctx.checkpoint()?;

            tokio::fs::create_dir_all(&content_dir)
                .await
                .map_err(|e| LauncherError::io(&content_dir, e))?;

            info!("Launching {}", label);
            debug!("Command (copy/paste): {}", format_command_for_logs(&cmd));

            let mut child = cmd
                .spawn()
                .map_err(|e| LauncherError::LaunchFailed(e.to_string()))?;
            forward_output(&label, &mut child);

            let process = RunningProcess::from_child(child);
            info!("Game for {} running with PID {:?}", label, process.pid());
            ctx.progress().set(1.0, "Game started");
            Ok(process)
        })
    }
}

fn forward_output(label: &str, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        let label = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!("[game:{}][stdout] {}", label, line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let label = label.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("[game:{}][stderr] {}", label, line);
            }
        });
    }
}

fn resolve_args(raw_args: &[String], vars: &[(&str, String)]) -> Vec<String> {
    let mut resolved_args = Vec::with_capacity(raw_args.len());

    for arg in raw_args {
        let resolved = vars.iter().fold(arg.clone(), |acc, (key, value)| {
            acc.replace(&format!("${{{key}}}"), value)
        });

        if resolved.contains("${") {
            debug!("Dropping unresolved argument {:?}", arg);
            drop_dangling_option(&mut resolved_args);
            continue;
        }

        resolved_args.push(resolved);
    }

    resolved_args
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn format_command_for_logs(cmd: &Command) -> String {
    let std_cmd = cmd.as_std();
    let program = shell_escape(&std_cmd.get_program().to_string_lossy());
    let args = std_cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
