// ─── Launch Supervisor ───
// Drives one launch: login, optional update, process start, monitoring and
// cleanup. Listener callbacks are always delivered on the UI executor.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::extract::ExtractDir;
use super::process::ProcessWatcher;
use super::runner::GameRunner;
use crate::core::auth::{AuthProvider, Session};
use crate::core::error::{LauncherError, SharedError};
use crate::core::instance::{Instance, InstanceStore};
use crate::core::task::{Executor, ObservableTask, Progress, TaskContext, WorkerPool};
use crate::core::update::InstanceUpdater;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Only install what is missing.
    Never,
    /// Update when the catalog flagged a newer version.
    #[default]
    IfPending,
    /// Always update, reaching the network even for offline sessions.
    Always,
}

impl UpdatePolicy {
    pub fn is_update_enabled(self) -> bool {
        !matches!(self, UpdatePolicy::Never)
    }

    /// Whether `instance` has to go through the updater before it can start.
    /// An instance that was never installed always does.
    pub fn requires_update(self, instance: &Instance) -> bool {
        if !instance.installed || self == UpdatePolicy::Always {
            return true;
        }
        self.is_update_enabled() && instance.update_pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    Idle,
    Authenticating,
    UpdateCheck,
    Updating,
    Launching,
    Monitoring,
    CleaningUp,
    Closed,
    Aborted,
    Failed,
}

impl LaunchStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LaunchStage::Closed | LaunchStage::Aborted | LaunchStage::Failed
        )
    }

    fn label(self) -> &'static str {
        match self {
            LaunchStage::Idle => "Waiting",
            LaunchStage::Authenticating => "Logging in...",
            LaunchStage::UpdateCheck => "Checking for updates...",
            LaunchStage::Updating => "Updating...",
            LaunchStage::Launching => "Launching...",
            LaunchStage::Monitoring => "Game running",
            LaunchStage::CleaningUp => "Cleaning up...",
            LaunchStage::Closed => "Game closed",
            LaunchStage::Aborted => "Launch cancelled",
            LaunchStage::Failed => "Launch failed",
        }
    }
}

impl fmt::Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a launch ended. Errors have already been reported to the listener.
#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    /// The game ran and exited normally.
    Closed,
    /// The user declined to log in.
    Aborted,
    Failed(SharedError),
}

impl LaunchOutcome {
    pub fn is_closed(&self) -> bool {
        matches!(self, LaunchOutcome::Closed)
    }
}

/// Receives launch notifications, always on the UI executor and in order.
pub trait LaunchListener: Send + Sync {
    /// The update finished; the catalog should be refreshed.
    fn instances_updated(&self) {}

    fn game_started(&self) {}

    /// The game exited and its scratch files are gone.
    fn game_closed(&self) {}

    /// Called once per failure, before `game_closed` when the game was started.
    fn launch_failed(&self, _error: &LauncherError) {}

    /// A sub-task began; `progress` can be polled for display.
    fn task_started(&self, _title: &str, _progress: Progress) {}
}

/// Everything needed to start one launch.
#[derive(Clone)]
pub struct LaunchOptions {
    pub instance: Instance,
    pub update_policy: UpdatePolicy,
    /// Skip the login step with an existing session.
    pub session: Option<Session>,
    pub listener: Arc<dyn LaunchListener>,
}

impl LaunchOptions {
    pub fn new(instance: Instance, listener: Arc<dyn LaunchListener>) -> Self {
        Self {
            instance,
            update_policy: UpdatePolicy::default(),
            session: None,
            listener,
        }
    }

    pub fn with_update_policy(mut self, update_policy: UpdatePolicy) -> Self {
        self.update_policy = update_policy;
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }
}

#[derive(Debug, Clone)]
struct StageHistory(Arc<Mutex<Vec<LaunchStage>>>);

impl StageHistory {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(vec![LaunchStage::Idle])))
    }

    fn enter(&self, stage: LaunchStage, progress: &Progress) {
        debug!("Launch stage: {:?}", stage);
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(stage);
        progress.set_status(stage.label());
    }

    fn snapshot(&self) -> Vec<LaunchStage> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Handle to a launch in flight.
#[derive(Debug, Clone)]
pub struct LaunchRun {
    task: ObservableTask<LaunchOutcome>,
    history: StageHistory,
}

impl LaunchRun {
    pub fn task(&self) -> &ObservableTask<LaunchOutcome> {
        &self.task
    }

    pub fn stage(&self) -> LaunchStage {
        self.history
            .snapshot()
            .last()
            .copied()
            .unwrap_or(LaunchStage::Idle)
    }

    /// Every stage entered so far, starting with `Idle`.
    pub fn history(&self) -> Vec<LaunchStage> {
        self.history.snapshot()
    }

    pub async fn outcome(&self) -> LaunchOutcome {
        self.task
            .outcome()
            .await
            .unwrap_or_else(LaunchOutcome::Failed)
    }
}

/// Collaborators the supervisor delegates to.
#[derive(Clone)]
pub struct LaunchServices {
    pub store: Arc<dyn InstanceStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub updater: Arc<dyn InstanceUpdater>,
    pub runner: Arc<dyn GameRunner>,
    pub watcher: Arc<dyn ProcessWatcher>,
}

#[derive(Clone)]
pub struct LaunchSupervisor {
    pool: WorkerPool,
    ui: Arc<dyn Executor>,
    services: LaunchServices,
    extract_root: PathBuf,
}

impl LaunchSupervisor {
    pub fn new(
        pool: WorkerPool,
        ui: Arc<dyn Executor>,
        services: LaunchServices,
        extract_root: PathBuf,
    ) -> Self {
        Self {
            pool,
            ui,
            services,
            extract_root,
        }
    }

    /// Start a launch in the background.
    ///
    /// The driver itself holds no worker slot; only the update and process
    /// start tasks it waits on do.
    pub fn launch(&self, options: LaunchOptions) -> LaunchRun {
        let history = StageHistory::new();
        let supervisor = self.clone();
        let stages = history.clone();
        let task = ObservableTask::spawn_detached(&self.pool, move |ctx| async move {
            Ok(supervisor.run(options, &stages, &ctx).await)
        });
        LaunchRun { task, history }
    }

    async fn run(&self, options: LaunchOptions, stages: &StageHistory, ctx: &TaskContext) -> LaunchOutcome {
        let LaunchOptions {
            mut instance,
            update_policy,
            session,
            listener,
        } = options;
        let progress = ctx.progress();
        info!(
            "Launching {} (update policy: {:?})",
            instance.name, update_policy
        );

        instance.last_accessed = Some(Utc::now());
        if let Err(e) = self.services.store.commit(&instance).await {
            warn!("Failed to record last access of {}: {}", instance.name, e);
        }

        // ── Login ──
        stages.enter(LaunchStage::Authenticating, progress);
        let session = match session {
            Some(session) => session,
            None => match self.services.auth.request_interactive().await {
                Some(session) => session,
                None => {
                    info!("Login declined; not launching {}", instance.name);
                    stages.enter(LaunchStage::Aborted, progress);
                    return LaunchOutcome::Aborted;
                }
            },
        }
        .sanitized();

        // ── Update ──
        stages.enter(LaunchStage::UpdateCheck, progress);
        if update_policy.requires_update(&instance) {
            stages.enter(LaunchStage::Updating, progress);
            let online = update_policy == UpdatePolicy::Always || session.is_online();
            info!("Updating {} before launch (online: {})", instance.name, online);

            let update = self
                .services
                .updater
                .update(instance.clone(), online, &self.pool);
            self.show_progress(&listener, format!("Updating {}", instance.display_title()), &update);
            let notified = listener.clone();
            update.on_complete(
                move |_| notified.instances_updated(),
                |_| {},
                self.ui.clone(),
            );

            match update.outcome().await {
                Ok(updated) => instance = updated,
                Err(e) => {
                    self.report_error(&listener, &e);
                    stages.enter(LaunchStage::Failed, progress);
                    return LaunchOutcome::Failed(e);
                }
            }
        }

        // ── Launch ──
        stages.enter(LaunchStage::Launching, progress);
        let extract_dir = match ExtractDir::create(&self.extract_root).await {
            Ok(dir) => dir,
            Err(e) => {
                let e = Arc::new(e);
                self.report_error(&listener, &e);
                stages.enter(LaunchStage::Failed, progress);
                return LaunchOutcome::Failed(e);
            }
        };

        let started = self
            .services
            .runner
            .start(&instance, &session, extract_dir.path(), &self.pool);
        self.show_progress(&listener, format!("Launching {}", instance.display_title()), &started);
        let notified = listener.clone();
        started.on_complete(move |_| notified.game_started(), |_| {}, self.ui.clone());

        let result = match started.outcome().await {
            Ok(process) => {
                stages.enter(LaunchStage::Monitoring, progress);
                self.services
                    .watcher
                    .watch(process)
                    .await
                    .map_err(Arc::new)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.report_error(&listener, e);
        }

        // ── Cleanup ──
        stages.enter(LaunchStage::CleaningUp, progress);
        extract_dir.cleanup().await;
        self.notify(&listener, |l| l.game_closed());

        match result {
            Ok(()) => {
                info!("{} closed", instance.name);
                stages.enter(LaunchStage::Closed, progress);
                LaunchOutcome::Closed
            }
            Err(e) => {
                stages.enter(LaunchStage::Failed, progress);
                LaunchOutcome::Failed(e)
            }
        }
    }

    fn notify<F>(&self, listener: &Arc<dyn LaunchListener>, f: F)
    where
        F: FnOnce(&dyn LaunchListener) + Send + 'static,
    {
        let listener = listener.clone();
        self.ui.execute(Box::new(move || f(listener.as_ref())));
    }

    fn report_error(&self, listener: &Arc<dyn LaunchListener>, e: &SharedError) {
        error!("Launch failed: {}", e);
        let e = e.clone();
        self.notify(listener, move |l| l.launch_failed(&e));
    }

    fn show_progress<T: Clone + Send + 'static>(
        &self,
        listener: &Arc<dyn LaunchListener>,
        title: String,
        task: &ObservableTask<T>,
    ) {
        let progress = task.progress_source();
        self.notify(listener, move |l| l.task_started(&title, progress));
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::core::error::LauncherResult;
    use crate::core::launch::runner::RunningProcess;
    use crate::core::task::UiContext;

    #[derive(Default)]
    struct MemoryStore {
        commits: Mutex<Vec<Instance>>,
    }

    #[async_trait]
    impl InstanceStore for MemoryStore {
        async fn load(&self, dir: &Path) -> Instance {
            Instance::new("", dir)
        }

        async fn commit(&self, instance: &Instance) -> LauncherResult<()> {
            self.commits.lock().unwrap().push(instance.clone());
            Ok(())
        }
    }

    struct FakeAuth {
        session: Option<Session>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthProvider for FakeAuth {
        async fn request_interactive(&self) -> Option<Session> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.session.clone()
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum UpdateBehavior {
        Succeed,
        Fail,
    }

    struct FakeUpdater {
        behavior: UpdateBehavior,
        online_flags: Mutex<Vec<bool>>,
    }

    impl InstanceUpdater for FakeUpdater {
        fn update(&self, mut instance: Instance, online: bool, pool: &WorkerPool) -> ObservableTask<Instance> {
            self.online_flags.lock().unwrap().push(online);
            let behavior = self.behavior;
            ObservableTask::spawn(pool, move |_ctx| async move {
                match behavior {
                    UpdateBehavior::Succeed => {
                        instance.installed = true;
                        instance.update_pending = false;
                        Ok(instance)
                    }
                    UpdateBehavior::Fail => Err(LauncherError::DownloadFailed {
                        url: "https://example.com/alpha.json".into(),
                        status: 500,
                    }),
                }
            })
        }
    }

    struct FakeRunner {
        fail: bool,
        block_cleanup: bool,
        extract_dirs: Mutex<Vec<PathBuf>>,
        players: Mutex<Vec<String>>,
    }

    impl GameRunner for FakeRunner {
        fn start(
            &self,
            _instance: &Instance,
            session: &Session,
            extract_dir: &Path,
            _pool: &WorkerPool,
        ) -> ObservableTask<RunningProcess> {
            assert!(extract_dir.is_dir());
            self.extract_dirs.lock().unwrap().push(extract_dir.to_path_buf());
            self.players.lock().unwrap().push(session.username.clone());
            if self.block_cleanup {
                // A plain file where the directory was cannot be removed as one.
                std::fs::remove_dir(extract_dir).unwrap();
                std::fs::write(extract_dir, b"locked").unwrap();
            }
            if self.fail {
                ObservableTask::completed(Err(LauncherError::LaunchFailed("no such program".into())))
            } else {
                ObservableTask::completed(Ok(RunningProcess::detached(Some(7))))
            }
        }
    }

    struct FakeWatcher {
        fail: bool,
    }

    #[async_trait]
    impl ProcessWatcher for FakeWatcher {
        async fn watch(&self, _process: RunningProcess) -> LauncherResult<()> {
            if self.fail {
                Err(LauncherError::ProcessExited { code: Some(1) })
            } else {
                Ok(())
            }
        }
    }

    struct RecordingListener {
        ui: UiContext,
        events: Mutex<Vec<String>>,
        off_ui_thread: AtomicBool,
    }

    impl RecordingListener {
        fn record(&self, event: &str) {
            if !self.ui.is_current() {
                self.off_ui_thread.store(true, Ordering::SeqCst);
            }
            self.events.lock().unwrap().push(event.to_string());
        }
    }

    impl LaunchListener for RecordingListener {
        fn instances_updated(&self) {
            self.record("instances_updated");
        }

        fn game_started(&self) {
            self.record("game_started");
        }

        fn game_closed(&self) {
            self.record("game_closed");
        }

        fn launch_failed(&self, _error: &LauncherError) {
            self.record("error");
        }
    }

    struct Harness {
        supervisor: LaunchSupervisor,
        ui: UiContext,
        store: Arc<MemoryStore>,
        auth: Arc<FakeAuth>,
        updater: Arc<FakeUpdater>,
        runner: Arc<FakeRunner>,
        listener: Arc<RecordingListener>,
        extract_root: tempfile::TempDir,
    }

    #[derive(Clone, Copy)]
    struct Scenario {
        login: bool,
        update: UpdateBehavior,
        launch_fails: bool,
        watch_fails: bool,
        cleanup_fails: bool,
    }

    impl Default for Scenario {
        fn default() -> Self {
            Self {
                login: true,
                update: UpdateBehavior::Succeed,
                launch_fails: false,
                watch_fails: false,
                cleanup_fails: false,
            }
        }
    }

    fn harness(scenario: Scenario) -> Harness {
        let ui = UiContext::spawn("test-ui").unwrap();
        let store = Arc::new(MemoryStore::default());
        let auth = Arc::new(FakeAuth {
            session: scenario.login.then(|| Session::offline("Alex")),
            calls: AtomicUsize::new(0),
        });
        let updater = Arc::new(FakeUpdater {
            behavior: scenario.update,
            online_flags: Mutex::new(Vec::new()),
        });
        let runner = Arc::new(FakeRunner {
            fail: scenario.launch_fails,
            block_cleanup: scenario.cleanup_fails,
            extract_dirs: Mutex::new(Vec::new()),
            players: Mutex::new(Vec::new()),
        });
        let listener = Arc::new(RecordingListener {
            ui: ui.clone(),
            events: Mutex::new(Vec::new()),
            off_ui_thread: AtomicBool::new(false),
        });
        let extract_root = tempfile::tempdir().unwrap();

        let supervisor = LaunchSupervisor::new(
            WorkerPool::current(1),
            Arc::new(ui.clone()),
            LaunchServices {
                store: store.clone(),
                auth: auth.clone(),
                updater: updater.clone(),
                runner: runner.clone(),
                watcher: Arc::new(FakeWatcher {
                    fail: scenario.watch_fails,
                }),
            },
            extract_root.path().to_path_buf(),
        );

        Harness {
            supervisor,
            ui,
            store,
            auth,
            updater,
            runner,
            listener,
            extract_root,
        }
    }

    impl Harness {
        async fn launch(&self, options: LaunchOptions) -> (LaunchOutcome, Vec<LaunchStage>) {
            let run = self.supervisor.launch(options);
            let outcome = run.outcome().await;
            self.flush_ui().await;
            (outcome, run.history())
        }

        fn options(&self, instance: Instance, policy: UpdatePolicy) -> LaunchOptions {
            LaunchOptions::new(instance, self.listener.clone()).with_update_policy(policy)
        }

        async fn flush_ui(&self) {
            let (tx, rx) = oneshot::channel();
            self.ui.execute(Box::new(move || {
                let _ = tx.send(());
            }));
            rx.await.unwrap();
        }

        fn events(&self) -> Vec<String> {
            assert!(!self.listener.off_ui_thread.load(Ordering::SeqCst));
            self.listener.events.lock().unwrap().clone()
        }

        fn update_calls(&self) -> Vec<bool> {
            self.updater.online_flags.lock().unwrap().clone()
        }

        fn launches(&self) -> usize {
            self.runner.extract_dirs.lock().unwrap().len()
        }

        fn extract_root_is_empty(&self) -> bool {
            std::fs::read_dir(self.extract_root.path())
                .unwrap()
                .next()
                .is_none()
        }
    }

    fn installed(name: &str) -> Instance {
        let mut instance = Instance::new(name, format!("/tmp/packlauncher-test/{name}"));
        instance.installed = true;
        instance
    }

    #[tokio::test]
    async fn up_to_date_instance_launches_without_update() {
        let h = harness(Scenario::default());
        let (outcome, history) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::IfPending))
            .await;

        assert!(outcome.is_closed());
        assert_eq!(
            history,
            vec![
                LaunchStage::Idle,
                LaunchStage::Authenticating,
                LaunchStage::UpdateCheck,
                LaunchStage::Launching,
                LaunchStage::Monitoring,
                LaunchStage::CleaningUp,
                LaunchStage::Closed,
            ]
        );
        assert_eq!(h.events(), vec!["game_started", "game_closed"]);
        assert!(h.update_calls().is_empty());
        assert_eq!(h.launches(), 1);
        assert!(h.extract_root_is_empty());
    }

    #[tokio::test]
    async fn last_access_is_recorded_before_login() {
        let h = harness(Scenario {
            login: false,
            ..Scenario::default()
        });
        let (outcome, _) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::IfPending))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Aborted));
        let commits = h.store.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].last_accessed.is_some());
    }

    #[tokio::test]
    async fn never_policy_skips_pending_update() {
        let h = harness(Scenario::default());
        let mut instance = installed("alpha");
        instance.update_pending = true;

        let (outcome, history) = h.launch(h.options(instance, UpdatePolicy::Never)).await;

        assert!(outcome.is_closed());
        assert!(!history.contains(&LaunchStage::Updating));
        assert!(h.update_calls().is_empty());
    }

    #[tokio::test]
    async fn pending_update_runs_before_launch() {
        let h = harness(Scenario::default());
        let mut instance = installed("alpha");
        instance.update_pending = true;

        let (outcome, history) = h.launch(h.options(instance, UpdatePolicy::IfPending)).await;

        assert!(outcome.is_closed());
        assert!(history.contains(&LaunchStage::Updating));
        assert_eq!(h.update_calls(), vec![false]);
        assert_eq!(
            h.events(),
            vec!["instances_updated", "game_started", "game_closed"]
        );
    }

    #[tokio::test]
    async fn always_policy_forces_online_update() {
        let h = harness(Scenario::default());
        let options = h
            .options(installed("alpha"), UpdatePolicy::Always)
            .with_session(Session::offline("Alex"));

        let (outcome, _) = h.launch(options).await;

        assert!(outcome.is_closed());
        assert_eq!(h.update_calls(), vec![true]);
        assert_eq!(h.auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn online_session_updates_online() {
        let h = harness(Scenario::default());
        let mut instance = installed("alpha");
        instance.update_pending = true;
        let options = h
            .options(instance, UpdatePolicy::IfPending)
            .with_session(Session::online("Alex", "uuid", "token"));

        h.launch(options).await;

        assert_eq!(h.update_calls(), vec![true]);
    }

    #[tokio::test]
    async fn missing_install_is_updated_even_with_never_policy() {
        let h = harness(Scenario::default());
        let instance = Instance::new("beta", "/tmp/packlauncher-test/beta");

        let (outcome, _) = h.launch(h.options(instance, UpdatePolicy::Never)).await;

        assert!(outcome.is_closed());
        assert_eq!(h.update_calls(), vec![false]);
        assert_eq!(h.auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declined_login_aborts_quietly() {
        let h = harness(Scenario {
            login: false,
            ..Scenario::default()
        });
        let (outcome, history) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::Always))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Aborted));
        assert_eq!(history.last(), Some(&LaunchStage::Aborted));
        assert!(LaunchStage::Aborted.is_terminal());
        assert!(!LaunchStage::Monitoring.is_terminal());
        assert!(h.events().is_empty());
        assert!(h.update_calls().is_empty());
        assert_eq!(h.launches(), 0);
    }

    #[tokio::test]
    async fn failed_update_stops_the_launch() {
        let h = harness(Scenario {
            update: UpdateBehavior::Fail,
            ..Scenario::default()
        });
        let (outcome, history) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::Always))
            .await;

        match outcome {
            LaunchOutcome::Failed(e) => {
                assert!(matches!(*e, LauncherError::DownloadFailed { status: 500, .. }))
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(history.last(), Some(&LaunchStage::Failed));
        assert_eq!(h.events(), vec!["error"]);
        assert_eq!(h.launches(), 0);
        assert!(h.extract_root_is_empty());
    }

    #[tokio::test]
    async fn failed_start_still_cleans_up_and_closes() {
        let h = harness(Scenario {
            launch_fails: true,
            ..Scenario::default()
        });
        let (outcome, history) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::Never))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Failed(_)));
        assert!(history.contains(&LaunchStage::CleaningUp));
        assert!(!history.contains(&LaunchStage::Monitoring));
        assert_eq!(h.events(), vec!["error", "game_closed"]);
        assert!(h.extract_root_is_empty());
    }

    #[tokio::test]
    async fn abnormal_exit_is_reported_and_closes() {
        let h = harness(Scenario {
            watch_fails: true,
            ..Scenario::default()
        });
        let (outcome, history) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::Never))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Failed(_)));
        assert_eq!(history.last(), Some(&LaunchStage::Failed));
        assert_eq!(h.events(), vec!["game_started", "error", "game_closed"]);
        assert!(h.extract_root_is_empty());
    }

    #[test]
    fn update_policy_decisions() {
        let mut instance = installed("alpha");
        assert!(!UpdatePolicy::IfPending.requires_update(&instance));
        assert!(UpdatePolicy::Always.requires_update(&instance));

        instance.update_pending = true;
        assert!(UpdatePolicy::IfPending.requires_update(&instance));
        assert!(!UpdatePolicy::Never.requires_update(&instance));

        instance.installed = false;
        assert!(UpdatePolicy::Never.requires_update(&instance));
        assert!(!UpdatePolicy::Never.is_update_enabled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_cleanup_still_closes() {
        let h = harness(Scenario {
            cleanup_fails: true,
            ..Scenario::default()
        });
        let (outcome, history) = h
            .launch(h.options(installed("alpha"), UpdatePolicy::Never))
            .await;

        assert!(outcome.is_closed());
        assert_eq!(history.last(), Some(&LaunchStage::Closed));
        assert_eq!(h.events(), vec!["game_started", "game_closed"]);

        let leftover = h.runner.extract_dirs.lock().unwrap()[0].clone();
        assert!(leftover.is_file(), "cleanup could not remove the entry");
    }

    #[tokio::test]
    async fn blank_session_fields_are_filled_before_launch() {
        let h = harness(Scenario::default());
        let options = h
            .options(installed("alpha"), UpdatePolicy::Never)
            .with_session(Session::offline("  "));

        let (outcome, _) = h.launch(options).await;

        assert!(outcome.is_closed());
        assert_eq!(*h.runner.players.lock().unwrap(), vec!["Player"]);
    }
}
