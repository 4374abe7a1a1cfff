use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::executor::{Executor, Inline, WorkerPool};
use super::progress::{Progress, ProgressSnapshot};
use crate::core::error::{LauncherError, LauncherResult, SharedError};

/// Result as delivered to every continuation of a task.
pub type TaskOutcome<T> = Result<T, SharedError>;

type Continuation<T> = Box<dyn FnOnce(TaskOutcome<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<(Continuation<T>, Arc<dyn Executor>)>),
    Done(TaskOutcome<T>),
}

struct Shared<T> {
    progress: Progress,
    cancel: CancellationToken,
    state: Mutex<State<T>>,
}

/// Handle given to a running computation.
#[derive(Debug, Clone)]
pub struct TaskContext {
    progress: Progress,
    cancel: CancellationToken,
}

impl TaskContext {
    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Safe point: bail out with `Cancelled` once cancellation was requested.
    pub fn checkpoint(&self) -> LauncherResult<()> {
        if self.cancel.is_cancelled() {
            Err(LauncherError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// An asynchronous unit of work with observable progress, cooperative
/// cancellation and ordered completion continuations.
///
/// Clones share the same underlying task.
pub struct ObservableTask<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ObservableTask<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ObservableTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableTask")
            .field("progress", &self.shared.progress.snapshot())
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish()
    }
}

impl<T: Clone + Send + 'static> ObservableTask<T> {
    /// Run `work` on the pool once a worker slot frees up.
    pub fn spawn<F, Fut>(pool: &WorkerPool, work: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = LauncherResult<T>> + Send + 'static,
    {
        Self::spawn_with_progress(pool, Progress::new(), work)
    }

    /// Like [`ObservableTask::spawn`], reporting into an existing progress source.
    pub fn spawn_with_progress<F, Fut>(pool: &WorkerPool, progress: Progress, work: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = LauncherResult<T>> + Send + 'static,
    {
        let task = Self::pending(progress);
        let ctx = task.context();
        task.drive(pool, async move { work(ctx).await.map_err(Arc::new) });
        task
    }

    /// Run a coordinating `work` that mostly awaits other tasks.
    ///
    /// It does not take a worker slot, so the tasks it waits on can never be
    /// starved by it.
    pub fn spawn_detached<F, Fut>(pool: &WorkerPool, work: F) -> Self
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = LauncherResult<T>> + Send + 'static,
    {
        let task = Self::pending(Progress::new());
        let ctx = task.context();
        let completer = task.clone();
        let body = pool
            .handle()
            .spawn(async move { work(ctx).await.map_err(Arc::new) });
        pool.handle().spawn(async move {
            completer.complete(join_outcome(body.await));
        });
        task
    }

    /// Task that is already finished; its continuations fire on registration.
    pub fn completed(result: LauncherResult<T>) -> Self {
        let task = Self::pending(Progress::new());
        task.complete(result.map_err(Arc::new));
        task
    }

    fn pending(progress: Progress) -> Self {
        Self {
            shared: Arc::new(Shared {
                progress,
                cancel: CancellationToken::new(),
                state: Mutex::new(State::Pending(Vec::new())),
            }),
        }
    }

    fn context(&self) -> TaskContext {
        TaskContext {
            progress: self.shared.progress.clone(),
            cancel: self.shared.cancel.clone(),
        }
    }

    fn drive<Fut>(&self, pool: &WorkerPool, work: Fut)
    where
        Fut: Future<Output = TaskOutcome<T>> + Send + 'static,
    {
        let completer = self.clone();
        let token = self.shared.cancel.clone();
        let worker_pool = pool.clone();
        let body = pool.handle().spawn(async move {
            let _permit = worker_pool.acquire(&token).await.map_err(Arc::new)?;
            work.await
        });

        pool.handle().spawn(async move {
            completer.complete(join_outcome(body.await));
        });
    }

    fn complete(&self, outcome: TaskOutcome<T>) {
        let continuations = {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, State::Done(outcome.clone())) {
                State::Pending(continuations) => continuations,
                State::Done(first) => {
                    debug!("Ignoring second completion of an observable task");
                    *state = State::Done(first);
                    return;
                }
            }
        };

        for (continuation, executor) in continuations {
            let outcome = outcome.clone();
            executor.execute(Box::new(move || continuation(outcome)));
        }
    }

    fn subscribe(&self, continuation: Continuation<T>, executor: Arc<dyn Executor>) {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let outcome = match &mut *state {
            State::Pending(continuations) => {
                continuations.push((continuation, executor));
                return;
            }
            State::Done(outcome) => outcome.clone(),
        };
        drop(state);
        executor.execute(Box::new(move || continuation(outcome)));
    }

    /// Latest progress; never blocks on the computation.
    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    /// Shareable progress source for a display.
    pub fn progress_source(&self) -> Progress {
        self.shared.progress.clone()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        matches!(
            *self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            State::Done(_)
        )
    }

    /// Register success/failure handlers, run exactly once on `executor`.
    ///
    /// Handlers registered on the same task are dispatched in registration
    /// order. Registering after completion dispatches right away.
    pub fn on_complete<S, E, X>(&self, on_success: S, on_failure: E, executor: X)
    where
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(SharedError) + Send + 'static,
        X: Executor + 'static,
    {
        self.subscribe(
            Box::new(move |outcome| match outcome {
                Ok(value) => on_success(value),
                Err(error) => on_failure(error),
            }),
            Arc::new(executor),
        );
    }

    /// Resolve once the task has delivered its result.
    pub async fn outcome(&self) -> TaskOutcome<T> {
        let (tx, rx) = oneshot::channel();
        self.subscribe(
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
            Arc::new(Inline),
        );
        rx.await
            .unwrap_or_else(|_| Err(Arc::new(LauncherError::Cancelled)))
    }

    /// Chain a dependent computation on this task's success.
    ///
    /// A failure of this task is passed through and `work` never runs. The
    /// chained task only takes a worker slot once this one has finished.
    pub fn transform<U, F, Fut>(&self, pool: &WorkerPool, work: F) -> ObservableTask<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T, TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = LauncherResult<U>> + Send + 'static,
    {
        let next = ObservableTask::<U>::pending(Progress::new());
        let ctx = next.context();
        let source = self.clone();
        let chained = next.clone();
        let worker_pool = pool.clone();

        pool.handle().spawn(async move {
            let upstream = tokio::select! {
                outcome = source.outcome() => outcome,
                _ = ctx.token().cancelled() => Err(Arc::new(LauncherError::Cancelled)),
            };
            match upstream {
                Ok(value) => {
                    chained.drive(&worker_pool, async move {
                        work(value, ctx).await.map_err(Arc::new)
                    });
                }
                Err(error) => chained.complete(Err(error)),
            }
        });

        next
    }
}

fn join_outcome<T>(joined: Result<TaskOutcome<T>, tokio::task::JoinError>) -> TaskOutcome<T> {
    match joined {
        Ok(outcome) => outcome,
        Err(join) => Err(Arc::new(LauncherError::TaskJoin(join.to_string()))),
    }
}
