pub mod extract;
pub mod process;
pub mod runner;
pub mod supervisor;

pub use extract::ExtractDir;
pub use process::{ChildProcessWatcher, ProcessWatcher};
pub use runner::{CommandRunner, GameRunner, RunningProcess};
pub use supervisor::{
    LaunchListener, LaunchOptions, LaunchOutcome, LaunchRun, LaunchServices, LaunchStage,
    LaunchSupervisor, UpdatePolicy,
};
