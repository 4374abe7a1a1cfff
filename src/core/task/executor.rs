use std::panic::AssertUnwindSafe;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::ThreadId;

use tokio::runtime::Handle;
use tokio::sync::{mpsc as async_mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// A unit of continuation work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere a continuation can run.
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job);
    }
}

/// Runs the job on whichever thread delivers the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Bounded pool on top of a tokio runtime.
///
/// Task bodies hold one permit while they run. Continuations posted through
/// [`Executor`] are short and skip the bound; they run one after another on a
/// dispatcher task, in submission order.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    jobs: async_mpsc::UnboundedSender<Job>,
    size: usize,
}

impl WorkerPool {
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        let size = max_concurrent.max(1);
        let (jobs, mut queue) = async_mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = queue.recv().await {
                if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!("A continuation panicked on the worker pool");
                }
            }
            debug!("Worker pool dropped; continuation dispatcher exiting");
        });

        Self {
            handle,
            permits: Arc::new(Semaphore::new(size)),
            jobs,
            size,
        }
    }

    /// Pool bound to the runtime of the calling task.
    ///
    /// Panics outside a tokio runtime, like [`Handle::current`].
    pub fn current(max_concurrent: usize) -> Self {
        Self::new(Handle::current(), max_concurrent)
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for a free worker slot, giving up if `token` fires first.
    pub async fn acquire(&self, token: &CancellationToken) -> LauncherResult<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(LauncherError::Cancelled),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| LauncherError::Other("worker pool is shut down".into()))
            }
        }
    }
}

impl Executor for WorkerPool {
    fn execute(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            warn!("Worker pool runtime is gone; dropping continuation");
        }
    }
}

/// Single dedicated thread that runs jobs strictly in submission order.
///
/// Listener notifications and progress display updates go here; nothing
/// long-running should ever be posted.
#[derive(Debug, Clone)]
pub struct UiContext {
    sender: mpsc::Sender<Job>,
    thread_id: ThreadId,
}

impl UiContext {
    pub fn spawn(name: &str) -> LauncherResult<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver {
                    job();
                }
                debug!("UI context drained; thread exiting");
            })
            .map_err(|e| LauncherError::Other(format!("cannot start UI thread: {e}")))?;

        Ok(Self {
            sender,
            thread_id: thread.thread().id(),
        })
    }

    /// Whether the caller is running on this context's thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }
}

impl Executor for UiContext {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            warn!("UI context is closed; dropping notification");
        }
    }
}
