use gantry_config::ConfigError;

/// Errors raised while turning a task handle into runnable work.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
  /// The handle or a loaded work unit is missing required configuration.
  #[error("invalid task configuration: {0}")]
  Config(#[from] ConfigError),

  /// A state blob is missing, unreadable, or cannot be decoded.
  #[error("failed to load state from '{path}': {message}")]
  StateLoad { path: String, message: String },
}
