use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::properties::Properties;

/// Job-level identity and configuration.
///
/// Written once by the job submitter; tasks only ever read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
  pub job_name: String,
  pub job_id: String,
  #[serde(default)]
  pub properties: Properties,
}

impl JobState {
  pub fn new(job_name: impl Into<String>, job_id: impl Into<String>) -> Self {
    Self {
      job_name: job_name.into(),
      job_id: job_id.into(),
      properties: Properties::new(),
    }
  }

  pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.properties.insert(key.into(), value.into());
    self
  }

  pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
    serde_json::from_slice(bytes).map_err(|source| ConfigError::Decode {
      kind: "job state",
      source,
    })
  }

  pub fn to_vec(&self) -> Result<Vec<u8>, ConfigError> {
    serde_json::to_vec(self).map_err(|source| ConfigError::Encode {
      kind: "job state",
      source,
    })
  }
}
