use std::collections::HashMap;

use gantry_config::{ConfigError, keys};

/// Task handle as supplied by the cluster scheduler.
#[derive(Debug, Clone, Default)]
pub struct ClusterTaskHandle {
  pub config: HashMap<String, String>,
}

impl ClusterTaskHandle {
  pub fn new(config: HashMap<String, String>) -> Self {
    Self { config }
  }

  pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.config.insert(key.into(), value.into());
    self
  }
}

/// The validated contents of a [`ClusterTaskHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
  pub job_id: String,
  pub work_unit_path: String,
}

impl TaskConfig {
  pub fn from_handle(handle: &ClusterTaskHandle) -> Result<Self, ConfigError> {
    Ok(Self {
      job_id: required(handle, keys::JOB_ID)?,
      work_unit_path: required(handle, keys::WORK_UNIT_FILE_PATH)?,
    })
  }
}

fn required(handle: &ClusterTaskHandle, key: &str) -> Result<String, ConfigError> {
  handle
    .config
    .get(key)
    .map(|v| v.trim())
    .filter(|v| !v.is_empty())
    .map(str::to_string)
    .ok_or_else(|| ConfigError::MissingProperty {
      key: key.to_string(),
    })
}
