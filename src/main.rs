use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::oneshot;
use tracing::{error, info};

use packlauncher_lib::core::error::{LauncherError, LauncherResult};
use packlauncher_lib::core::instance::{Catalog, Instance};
use packlauncher_lib::core::launch::{LaunchListener, LaunchOptions, LaunchOutcome, UpdatePolicy};
use packlauncher_lib::core::state::LauncherState;
use packlauncher_lib::core::task::{Executor, Progress, UiContext};

#[derive(Parser)]
#[command(name = "packlauncher", version, about = "Install, reset and launch modpack instances")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile local and remote instances and print the catalog.
    List,
    /// Wipe an instance's configuration and mods so the next launch reinstalls them.
    Reset { name: String },
    /// Log in, update if needed, and run an instance until the game exits.
    Launch {
        name: String,
        #[arg(long, value_enum, default_value_t = PolicyArg::IfPending)]
        update: PolicyArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Never,
    IfPending,
    Always,
}

impl From<PolicyArg> for UpdatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Never => UpdatePolicy::Never,
            PolicyArg::IfPending => UpdatePolicy::IfPending,
            PolicyArg::Always => UpdatePolicy::Always,
        }
    }
}

struct ConsoleListener;

impl LaunchListener for ConsoleListener {
    fn instances_updated(&self) {
        info!("Instance files updated");
    }

    fn game_started(&self) {
        println!("Game started.");
    }

    fn game_closed(&self) {
        println!("Game closed.");
    }

    fn launch_failed(&self, error: &LauncherError) {
        eprintln!("Launch failed: {error}");
    }

    fn task_started(&self, title: &str, _progress: Progress) {
        println!("{title}...");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    packlauncher_lib::init_logging();
    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> LauncherResult<ExitCode> {
    let state = LauncherState::load()?;
    let catalog = refresh_catalog(&state).await?;

    match command {
        Command::List => {
            catalog.sort();
            for instance in catalog.snapshot() {
                println!(
                    "{:<24} {:<12} {}{}",
                    instance.name,
                    instance.version.as_deref().unwrap_or("-"),
                    if instance.installed { "installed" } else { "available" },
                    if instance.update_pending { ", update pending" } else { "" },
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { name } => {
            let instance = find(&catalog, &name)?;
            let resetter = state.resetter(instance);
            println!("{}", resetter.describe());
            resetter
                .reset(&state.pool)
                .outcome()
                .await
                .map_err(|e| LauncherError::Other(e.to_string()))?;
            println!("{name} was reset; it will be reinstalled on next launch.");
            Ok(ExitCode::SUCCESS)
        }
        Command::Launch { name, update } => {
            let instance = find(&catalog, &name)?;
            let ui = UiContext::spawn("packlauncher-ui")?;
            let supervisor = state.launch_supervisor(Arc::new(ui.clone()))?;
            let options = LaunchOptions::new(instance, Arc::new(ConsoleListener))
                .with_update_policy(update.into());

            let outcome = supervisor.launch(options).outcome().await;
            drain(&ui).await;
            match outcome {
                LaunchOutcome::Closed => Ok(ExitCode::SUCCESS),
                LaunchOutcome::Aborted => {
                    println!("Launch cancelled. Set offline_username in the settings to log in.");
                    Ok(ExitCode::FAILURE)
                }
                LaunchOutcome::Failed(_) => Ok(ExitCode::FAILURE),
            }
        }
    }
}

/// Reconcile, keeping whatever was merged when the remote list is unreachable.
async fn refresh_catalog(state: &LauncherState) -> LauncherResult<Arc<Catalog>> {
    let reconciler = state.reconciler()?;
    match reconciler
        .reconcile(state.catalog.clone(), &state.pool)
        .outcome()
        .await
    {
        Ok(catalog) => Ok(catalog),
        Err(e) if e.is_fatal() => Err(LauncherError::Other(e.to_string())),
        Err(e) => {
            eprintln!("warning: {e}");
            Ok(state.catalog.clone())
        }
    }
}

/// Wait until every notification posted so far has been delivered.
async fn drain(ui: &UiContext) {
    let (tx, rx) = oneshot::channel();
    ui.execute(Box::new(move || {
        let _ = tx.send(());
    }));
    let _ = rx.await;
}

fn find(catalog: &Catalog, name: &str) -> LauncherResult<Instance> {
    catalog
        .find(name)
        .ok_or_else(|| LauncherError::InstanceNotFound(name.to_string()))
}
