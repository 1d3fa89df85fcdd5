//! Task runtime state.
//!
//! Task states: PENDING → RUNNING → {COMMITTED | FAILED | CANCELLED}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a single task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
  /// Prepared, not yet picked up by a worker.
  Pending,
  /// A worker is running the pipeline.
  Running,
  /// Output was published to its final location.
  Committed,
  /// The pipeline failed; no output was published.
  Failed,
  /// The pipeline stopped at a cancellation checkpoint.
  Cancelled,
}

impl TaskStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      TaskStatus::Committed | TaskStatus::Failed | TaskStatus::Cancelled
    )
  }

  /// Check if transition from this status to target is valid.
  pub fn can_transition_to(&self, target: TaskStatus) -> bool {
    match (self, target) {
      (TaskStatus::Pending, TaskStatus::Running) => true,
      // Cancelled or failed before a worker picked it up
      (TaskStatus::Pending, TaskStatus::Cancelled) => true,
      (TaskStatus::Pending, TaskStatus::Failed) => true,

      (TaskStatus::Running, TaskStatus::Committed) => true,
      (TaskStatus::Running, TaskStatus::Failed) => true,
      (TaskStatus::Running, TaskStatus::Cancelled) => true,

      _ => false,
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TaskStatus::Pending => "PENDING",
      TaskStatus::Running => "RUNNING",
      TaskStatus::Committed => "COMMITTED",
      TaskStatus::Failed => "FAILED",
      TaskStatus::Cancelled => "CANCELLED",
    };
    f.write_str(s)
  }
}

/// Record counters of one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
  /// Records pulled from the extractor.
  pub read: u64,
  /// Records emitted by the last converter of the chain.
  pub converted: u64,
  /// Records accepted by the writer.
  pub written: u64,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid task state transition from {from} to {to}")]
pub struct InvalidTransition {
  pub from: TaskStatus,
  pub to: TaskStatus,
}

/// Runtime record of one task attempt.
///
/// Only the worker running the task mutates it; everyone else sees clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
  pub task_id: String,
  pub job_id: String,
  pub job_name: String,
  pub status: TaskStatus,
  pub started_at: Option<DateTime<Utc>>,
  pub ended_at: Option<DateTime<Utc>>,
  pub counts: TaskCounts,
  pub error: Option<String>,
}

impl TaskState {
  /// Create a new task in PENDING status.
  pub fn new(
    task_id: impl Into<String>,
    job_id: impl Into<String>,
    job_name: impl Into<String>,
  ) -> Self {
    Self {
      task_id: task_id.into(),
      job_id: job_id.into(),
      job_name: job_name.into(),
      status: TaskStatus::Pending,
      started_at: None,
      ended_at: None,
      counts: TaskCounts::default(),
      error: None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  /// Move to RUNNING and record the start time.
  pub fn start(&mut self) -> Result<(), InvalidTransition> {
    self.transition(TaskStatus::Running)?;
    self.started_at = Some(Utc::now());
    Ok(())
  }

  pub fn commit(&mut self) -> Result<(), InvalidTransition> {
    self.finish(TaskStatus::Committed)
  }

  pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
    self.finish(TaskStatus::Failed)?;
    self.error = Some(error.into());
    Ok(())
  }

  pub fn cancel(&mut self) -> Result<(), InvalidTransition> {
    self.finish(TaskStatus::Cancelled)
  }

  /// Wall-clock time between start and end, if both are known.
  pub fn duration(&self) -> Option<chrono::Duration> {
    match (self.started_at, self.ended_at) {
      (Some(start), Some(end)) => Some(end - start),
      _ => None,
    }
  }

  fn finish(&mut self, status: TaskStatus) -> Result<(), InvalidTransition> {
    self.transition(status)?;
    self.ended_at = Some(Utc::now());
    Ok(())
  }

  fn transition(&mut self, to: TaskStatus) -> Result<(), InvalidTransition> {
    if !self.status.can_transition_to(to) {
      return Err(InvalidTransition {
        from: self.status,
        to,
      });
    }
    self.status = to;
    Ok(())
  }
}
