use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use gantry_config::{TaskState, TaskStatus};
use gantry_pipeline::ProgressListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Registry of in-flight task states keyed by task id.
///
/// Every read returns an owned copy taken under the lock, so callers never
/// observe a partially applied update.
#[derive(Default)]
pub struct TaskStateTracker {
  tasks: RwLock<HashMap<String, TaskState>>,
  reporter: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl TaskStateTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Start tracking a task. Replaces any previous state for the same id.
  pub fn register(&self, state: TaskState) {
    debug!(task_id = %state.task_id, status = %state.status, "task registered");
    self.write().insert(state.task_id.clone(), state);
  }

  /// Stop tracking a task, returning its last known state.
  pub fn unregister(&self, task_id: &str) -> Option<TaskState> {
    let state = self.write().remove(task_id);
    if state.is_some() {
      debug!(task_id, "task unregistered");
    }
    state
  }

  pub fn snapshot(&self, task_id: &str) -> Option<TaskState> {
    self.read().get(task_id).cloned()
  }

  /// Copies of every tracked task, ordered by task id.
  pub fn snapshot_all(&self) -> Vec<TaskState> {
    let mut states: Vec<_> = self.read().values().cloned().collect();
    states.sort_by(|a, b| a.task_id.cmp(&b.task_id));
    states
  }

  pub fn len(&self) -> usize {
    self.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.read().is_empty()
  }

  /// Number of tracked tasks currently in `status`.
  pub fn count_with_status(&self, status: TaskStatus) -> usize {
    self.read().values().filter(|s| s.status == status).count()
  }

  /// Log the progress of every tracked task once per `interval` until
  /// [`shutdown`](Self::shutdown) is called.
  ///
  /// Must be called from within a tokio runtime. Calling it again replaces
  /// the running reporter. A zero interval is ignored.
  pub fn start_reporting(self: &Arc<Self>, interval: Duration) {
    if interval.is_zero() {
      warn!("progress reporting interval must be non-zero, reporting disabled");
      return;
    }

    let token = CancellationToken::new();
    let tracker = Arc::clone(self);
    let stop = token.clone();

    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      // The first tick completes immediately
      ticker.tick().await;
      loop {
        tokio::select! {
          _ = stop.cancelled() => break,
          _ = ticker.tick() => tracker.report(),
        }
      }
    });

    let previous = self
      .reporter
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .replace((token, handle));
    if let Some((token, _)) = previous {
      token.cancel();
    }
    info!(interval_ms = interval.as_millis() as u64, "progress reporting started");
  }

  /// Emit one progress event per tracked task.
  pub fn report(&self) {
    for state in self.snapshot_all() {
      info!(
        task_id = %state.task_id,
        job_id = %state.job_id,
        status = %state.status,
        read = state.counts.read,
        converted = state.counts.converted,
        written = state.counts.written,
        "task progress"
      );
    }
  }

  /// Stop the reporter and release every tracked task.
  ///
  /// Tasks are returned in whatever state they were last seen in; a task
  /// still RUNNING is reported as such and left for its worker to finish.
  pub async fn shutdown(&self) -> Vec<TaskState> {
    let reporter = self.reporter.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some((token, handle)) = reporter {
      token.cancel();
      if let Err(e) = handle.await {
        warn!(error = %e, "progress reporter ended abnormally");
      }
    }

    let mut states: Vec<_> = self.write().drain().map(|(_, state)| state).collect();
    states.sort_by(|a, b| a.task_id.cmp(&b.task_id));

    for state in states.iter().filter(|s| !s.is_terminal()) {
      warn!(
        task_id = %state.task_id,
        status = %state.status,
        "task released before reaching a terminal state"
      );
    }
    info!(released = states.len(), "task tracker shut down");
    states
  }

  fn read(&self) -> RwLockReadGuard<'_, HashMap<String, TaskState>> {
    self.tasks.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, TaskState>> {
    self.tasks.write().unwrap_or_else(|e| e.into_inner())
  }
}

impl ProgressListener for TaskStateTracker {
  /// Updates for ids that are not registered are dropped. This covers late
  /// snapshots from a worker whose task was abandoned and unregistered.
  fn on_progress(&self, task_id: &str, state: &TaskState) {
    let mut tasks = self.write();
    match tasks.get_mut(task_id) {
      Some(slot) => slot.clone_from(state),
      None => debug!(task_id, "progress for untracked task dropped"),
    }
  }
}
