//! Executor errors.

/// Errors reported by the task executor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
  /// The executor has been stopped and accepts no new work.
  #[error("executor closed")]
  Closed,

  /// The executor was configured with an unusable value.
  #[error("invalid executor configuration: {message}")]
  InvalidConfig { message: String },

  /// `start` was called outside a tokio runtime.
  #[error("executor must be started inside a tokio runtime")]
  NoRuntime,

  /// The unit of work panicked.
  #[error("task panicked: {message}")]
  Panicked { message: String },

  /// The unit of work was dropped before producing a result.
  #[error("task dropped before completion")]
  Dropped,
}
