use std::time::Duration;

/// Configuration for the task executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
  /// Maximum number of units of work running at once.
  pub pool_size: usize,
  /// How long `stop` waits for in-flight work before giving up.
  pub shutdown_timeout: Duration,
}

impl Default for ExecutorConfig {
  fn default() -> Self {
    Self {
      pool_size: std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4),
      shutdown_timeout: Duration::from_secs(30),
    }
  }
}

impl ExecutorConfig {
  pub fn with_pool_size(mut self, pool_size: usize) -> Self {
    self.pool_size = pool_size;
    self
  }

  pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
    self.shutdown_timeout = timeout;
    self
  }
}
