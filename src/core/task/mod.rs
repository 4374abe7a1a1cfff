//! Observable tasks: cancellable async work with progress and ordered
//! completion continuations, plus the executors they report back on.

mod executor;
mod observable;
mod progress;

pub use executor::{Executor, Inline, Job, UiContext, WorkerPool};
pub use observable::{ObservableTask, TaskContext, TaskOutcome};
pub use progress::{Progress, ProgressSnapshot, INDETERMINATE};
