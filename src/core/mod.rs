// ─── PackLauncher Core ───
// Launcher backend for remotely published modpack instances.
//
// Architecture:
//   core/
//     task/     : Observable tasks, worker pool and UI executor
//     instance/ : Instance model, store, catalog + remote reconciliation
//     update/   : Updater and the hard reset task
//     launch/   : Launch supervisor, game runner, process watcher
//     auth/     : Sessions and login providers
//     state/    : Settings and default wiring

pub mod auth;
pub mod error;
pub mod fs;
pub mod http;
pub mod instance;
pub mod launch;
pub mod state;
pub mod task;
pub mod update;
