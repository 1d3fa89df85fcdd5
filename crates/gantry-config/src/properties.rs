use std::collections::BTreeMap;

use crate::error::ConfigError;

/// Ordered string key/value configuration.
pub type Properties = BTreeMap<String, String>;

/// Work unit properties looked up over job properties.
///
/// A key set on the work unit wins over the same key set on the job, so
/// job-wide defaults only need to be written once.
#[derive(Debug, Clone, Copy)]
pub struct LayeredProperties<'a> {
  work_unit: &'a Properties,
  job: &'a Properties,
}

impl<'a> LayeredProperties<'a> {
  pub fn new(work_unit: &'a Properties, job: &'a Properties) -> Self {
    Self { work_unit, job }
  }

  /// Look up a key, treating blank values as absent.
  pub fn get(&self, key: &str) -> Option<&'a str> {
    self
      .work_unit
      .get(key)
      .or_else(|| self.job.get(key))
      .map(|v| v.trim())
      .filter(|v| !v.is_empty())
  }

  pub fn require(&self, key: &str) -> Result<&'a str, ConfigError> {
    self.get(key).ok_or_else(|| ConfigError::MissingProperty {
      key: key.to_string(),
    })
  }

  /// Parse a positive integer, falling back to `default` when absent.
  pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
    match self.get(key) {
      None => Ok(default),
      Some(raw) => match raw.parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidProperty {
          key: key.to_string(),
          value: raw.to_string(),
          message: "must be at least 1".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidProperty {
          key: key.to_string(),
          value: raw.to_string(),
          message: e.to_string(),
        }),
      },
    }
  }

  /// Split a comma-separated list, dropping blank entries.
  pub fn get_list(&self, key: &str) -> Vec<&'a str> {
    self
      .get(key)
      .map(|raw| {
        raw
          .split(',')
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .collect()
      })
      .unwrap_or_default()
  }
}
