//! Configuration errors.

/// Errors raised while reading task configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// A required key is absent or empty.
  #[error("missing required property '{key}'")]
  MissingProperty { key: String },

  /// A key is present but its value cannot be used.
  #[error("invalid value '{value}' for property '{key}': {message}")]
  InvalidProperty {
    key: String,
    value: String,
    message: String,
  },

  /// A persisted state blob could not be decoded.
  #[error("failed to decode {kind}: {source}")]
  Decode {
    kind: &'static str,
    #[source]
    source: serde_json::Error,
  },

  /// A state value could not be encoded.
  #[error("failed to encode {kind}: {source}")]
  Encode {
    kind: &'static str,
    #[source]
    source: serde_json::Error,
  },
}
