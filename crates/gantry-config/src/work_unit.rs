use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::keys;
use crate::properties::Properties;

/// One partition of a job's input.
///
/// Maps to exactly one task. All processing configuration (source, converter
/// chain, writer, output paths, task id) lives in its properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
  #[serde(default)]
  pub properties: Properties,
}

impl WorkUnit {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.set_property(key, value);
    self
  }

  pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.properties.insert(key.into(), value.into());
  }

  pub fn property(&self, key: &str) -> Option<&str> {
    self.properties.get(key).map(String::as_str)
  }

  /// The task id of this work unit.
  pub fn task_id(&self) -> Result<&str, ConfigError> {
    self
      .property(keys::TASK_ID)
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .ok_or_else(|| ConfigError::MissingProperty {
        key: keys::TASK_ID.to_string(),
      })
  }

  pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
    serde_json::from_slice(bytes).map_err(|source| ConfigError::Decode {
      kind: "work unit",
      source,
    })
  }

  pub fn to_vec(&self) -> Result<Vec<u8>, ConfigError> {
    serde_json::to_vec(self).map_err(|source| ConfigError::Encode {
      kind: "work unit",
      source,
    })
  }
}
