//! Execution bridge implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gantry_config::{ConfigError, JobState, TaskState, WorkUnit, keys};
use gantry_pipeline::{PipelineError, PipelineRunner, PipelineSummary, TaskWork};
use gantry_state_store::{StateStore, job_state_path};
use gantry_task_executor::{TaskExecutor, TaskHandle};
use gantry_tracker::TaskStateTracker;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::BridgeError;
use crate::handle::{ClusterTaskHandle, TaskConfig};
use crate::result::TaskResult;

/// How long a cancelled task may take to acknowledge before it is abandoned.
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(10);

type Outcome = (TaskState, Result<PipelineSummary, PipelineError>);

#[derive(Debug, Clone)]
pub struct BridgeConfig {
  /// Directory holding `<job-id>.job.state` blobs.
  pub app_work_dir: PathBuf,
  pub cancel_grace: Duration,
}

impl BridgeConfig {
  pub fn new(app_work_dir: impl Into<PathBuf>) -> Self {
    Self {
      app_work_dir: app_work_dir.into(),
      cancel_grace: DEFAULT_CANCEL_GRACE,
    }
  }

  pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
    self.cancel_grace = grace;
    self
  }
}

/// A handle resolved into runnable work, with its PENDING state.
#[derive(Debug, Clone)]
pub struct PreparedTask {
  pub work: TaskWork,
  pub state: TaskState,
}

/// Runs cluster-assigned tasks on the local executor.
pub struct ExecutionBridge {
  store: Arc<dyn StateStore>,
  executor: Arc<TaskExecutor>,
  tracker: Arc<TaskStateTracker>,
  runner: PipelineRunner,
  config: BridgeConfig,
}

impl ExecutionBridge {
  pub fn new(
    store: Arc<dyn StateStore>,
    executor: Arc<TaskExecutor>,
    tracker: Arc<TaskStateTracker>,
    runner: PipelineRunner,
    config: BridgeConfig,
  ) -> Self {
    Self {
      store,
      executor,
      tracker,
      runner,
      config,
    }
  }

  pub fn executor(&self) -> &Arc<TaskExecutor> {
    &self.executor
  }

  pub fn tracker(&self) -> &Arc<TaskStateTracker> {
    &self.tracker
  }

  pub fn config(&self) -> &BridgeConfig {
    &self.config
  }

  /// Prepare and run one handle. Preparation failures are reported as
  /// FAILED without submitting anything to the executor.
  pub async fn execute(&self, handle: &ClusterTaskHandle, cancel: &CancellationToken) -> TaskResult {
    match self.prepare(handle).await {
      Ok(prepared) => self.run(prepared, cancel).await,
      Err(e) => {
        error!(error = %e, "task preparation failed");
        TaskResult::failed(e.to_string())
      }
    }
  }

  /// Resolve a handle into its job state and work unit.
  #[instrument(name = "bridge_prepare", skip_all, fields(job_id, task_id))]
  pub async fn prepare(&self, handle: &ClusterTaskHandle) -> Result<PreparedTask, BridgeError> {
    let config = TaskConfig::from_handle(handle)?;
    tracing::Span::current().record("job_id", config.job_id.as_str());

    let job_path = job_state_path(&self.config.app_work_dir, &config.job_id)
      .to_string_lossy()
      .into_owned();
    let job = self.load(&job_path, JobState::from_slice).await?;
    let work_unit = self.load(&config.work_unit_path, WorkUnit::from_slice).await?;

    if job.job_id != config.job_id {
      return Err(job_mismatch(&config.job_id, &job.job_id).into());
    }
    if let Some(unit_job_id) = work_unit
      .property(keys::JOB_ID)
      .map(str::trim)
      .filter(|v| !v.is_empty())
      && unit_job_id != config.job_id
    {
      return Err(job_mismatch(&config.job_id, unit_job_id).into());
    }

    let task_id = work_unit.task_id()?.to_string();
    tracing::Span::current().record("task_id", task_id.as_str());

    let state = TaskState::new(task_id, &job.job_id, &job.job_name);
    info!(job_name = %job.job_name, "task prepared");

    Ok(PreparedTask {
      work: TaskWork { job, work_unit },
      state,
    })
  }

  /// Run a prepared task until it reaches a terminal state or `cancel`
  /// fires and the grace period runs out.
  #[instrument(
    name = "bridge_run",
    skip_all,
    fields(job_id = %prepared.state.job_id, task_id = %prepared.state.task_id)
  )]
  pub async fn run(&self, prepared: PreparedTask, cancel: &CancellationToken) -> TaskResult {
    let PreparedTask { work, state } = prepared;
    let task_id = state.task_id.clone();

    if cancel.is_cancelled() {
      info!("task cancelled before submission");
      return TaskResult::canceled("task cancelled before start");
    }

    // The pipeline watches a child of the scheduler's token. Executor
    // shutdown is forwarded into it once the work has been queued. The guard
    // ends the forwarding when this call returns.
    let task_cancel = cancel.child_token();
    let _task_cancel_guard = task_cancel.clone().drop_guard();

    self.tracker.register(state.clone());

    let runner = self.runner.clone();
    let tracker = Arc::clone(&self.tracker);
    let pipeline_cancel = task_cancel.clone();
    let submitted = self.executor.submit(move |_| {
      let mut state = state;
      let outcome = runner.run(&work, &mut state, tracker.as_ref(), &pipeline_cancel);
      (state, outcome)
    });

    let result = match submitted {
      Ok(handle) => {
        forward_cancellation(handle.cancel_token().clone(), task_cancel);
        self.wait(handle, cancel).await
      }
      Err(e) => {
        error!(error = %e, "task submission rejected");
        TaskResult::failed(e.to_string())
      }
    };

    self.tracker.unregister(&task_id);
    info!(status = %result.status, message = %result.message, "task finished");
    result
  }

  async fn wait(&self, mut handle: TaskHandle<Outcome>, cancel: &CancellationToken) -> TaskResult {
    let joined = tokio::select! {
      biased;
      joined = &mut handle => joined,
      _ = cancel.cancelled() => {
        info!("cancellation requested");
        handle.cancel();
        match tokio::time::timeout(self.config.cancel_grace, &mut handle).await {
          Ok(joined) => joined,
          Err(_) => {
            warn!(
              grace_ms = self.config.cancel_grace.as_millis() as u64,
              "task did not acknowledge cancellation, abandoning worker"
            );
            return TaskResult::canceled("task cancelled, worker abandoned after grace period");
          }
        }
      }
    };

    match joined {
      Ok((state, Ok(summary))) => {
        let mut result = TaskResult::from_state(&state);
        result.message = summary.to_string();
        result
      }
      Ok((state, Err(_))) => TaskResult::from_state(&state),
      // A panicking worker lands here with the panic message as cause
      Err(e) => {
        error!(error = %e, "task worker failed");
        TaskResult::failed(e.to_string())
      }
    }
  }

  async fn load<T>(
    &self,
    path: &str,
    decode: impl FnOnce(&[u8]) -> Result<T, ConfigError>,
  ) -> Result<T, BridgeError> {
    let state_load = |message: String| BridgeError::StateLoad {
      path: path.to_string(),
      message,
    };
    let bytes = self
      .store
      .load(path)
      .await
      .map_err(|e| state_load(e.to_string()))?;
    decode(&bytes).map_err(|e| state_load(e.to_string()))
  }
}

/// Cancel `to` once `from` is cancelled. Returns early if `to` is cancelled
/// first.
fn forward_cancellation(from: CancellationToken, to: CancellationToken) {
  tokio::spawn(async move {
    tokio::select! {
      _ = from.cancelled() => to.cancel(),
      _ = to.cancelled() => {}
    }
  });
}

fn job_mismatch(expected: &str, found: &str) -> ConfigError {
  ConfigError::InvalidProperty {
    key: keys::JOB_ID.to_string(),
    value: found.to_string(),
    message: format!("task handle belongs to job '{}'", expected),
  }
}
