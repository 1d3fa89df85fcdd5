//! Progress reporting from the runner to observers.

use gantry_config::TaskState;

/// Receives task state snapshots while a pipeline runs.
///
/// The runner calls `on_progress` after every batch and once more after the
/// task reaches a terminal status. Implementations must not block for long:
/// they run on the task's worker thread.
pub trait ProgressListener: Send + Sync {
  fn on_progress(&self, task_id: &str, state: &TaskState);
}

/// A listener that discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ProgressListener for NoopListener {
  fn on_progress(&self, _task_id: &str, _state: &TaskState) {}
}
