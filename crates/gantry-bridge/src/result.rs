//! Task result reported to the scheduler.

use std::fmt;

use gantry_config::{TaskState, TaskStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskResultStatus {
  Completed,
  Failed,
  Canceled,
}

impl fmt::Display for TaskResultStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TaskResultStatus::Completed => write!(f, "COMPLETED"),
      TaskResultStatus::Failed => write!(f, "FAILED"),
      TaskResultStatus::Canceled => write!(f, "CANCELED"),
    }
  }
}

/// Outcome of one task, as returned to the scheduler.
///
/// `status` is COMPLETED exactly when the task's state reached COMMITTED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
  pub status: TaskResultStatus,
  pub message: String,
}

impl TaskResult {
  pub fn failed(message: impl Into<String>) -> Self {
    Self {
      status: TaskResultStatus::Failed,
      message: message.into(),
    }
  }

  pub fn canceled(message: impl Into<String>) -> Self {
    Self {
      status: TaskResultStatus::Canceled,
      message: message.into(),
    }
  }

  /// Derive the result from the last known state of a task.
  ///
  /// A state that never reached a terminal status belongs to a worker that
  /// was abandoned, which is reported as CANCELED.
  pub fn from_state(state: &TaskState) -> Self {
    match state.status {
      TaskStatus::Committed => Self {
        status: TaskResultStatus::Completed,
        message: format!(
          "read {} records, converted {}, wrote {}",
          state.counts.read, state.counts.converted, state.counts.written
        ),
      },
      TaskStatus::Failed => Self::failed(
        state
          .error
          .clone()
          .unwrap_or_else(|| "task failed".to_string()),
      ),
      TaskStatus::Cancelled => Self::canceled("task cancelled"),
      TaskStatus::Pending | TaskStatus::Running => {
        Self::canceled(format!("task abandoned while {}", state.status))
      }
    }
  }

  pub fn is_completed(&self) -> bool {
    self.status == TaskResultStatus::Completed
  }
}
