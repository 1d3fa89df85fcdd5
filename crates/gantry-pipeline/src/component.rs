//! Pluggable pipeline component traits.

use std::path::Path;

use gantry_config::LayeredProperties;

/// A single record flowing through the pipeline.
pub type Record = serde_json::Value;

/// Failure raised by a component while constructing or processing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ComponentError {
  pub message: String,
}

impl ComponentError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

impl From<std::io::Error> for ComponentError {
  fn from(e: std::io::Error) -> Self {
    Self::new(format!("io error: {}", e))
  }
}

impl From<serde_json::Error> for ComponentError {
  fn from(e: serde_json::Error) -> Self {
    Self::new(format!("json error: {}", e))
  }
}

impl From<gantry_config::ConfigError> for ComponentError {
  fn from(e: gantry_config::ConfigError) -> Self {
    Self::new(e.to_string())
  }
}

/// Everything a component factory may read while constructing a component.
#[derive(Debug, Clone, Copy)]
pub struct ComponentContext<'a> {
  pub job_id: &'a str,
  pub task_id: &'a str,
  /// Work unit properties layered over job properties.
  pub properties: LayeredProperties<'a>,
  /// File the writer must write to. Never the final output location.
  pub staging_file: &'a Path,
}

/// Produces the input records of a task as a lazy, finite sequence.
///
/// Not restartable: once `None` is returned the sequence is exhausted.
pub trait Extractor {
  fn next_record(&mut self) -> Result<Option<Record>, ComponentError>;
}

/// One stage of the converter chain.
///
/// Emits zero, one, or many records per input record. Returning an empty
/// vector drops the record.
pub trait Converter {
  fn convert(&self, record: Record) -> Result<Vec<Record>, ComponentError>;
}

/// Append-only sink writing to the staging file.
pub trait Writer {
  fn write(&mut self, record: Record) -> Result<(), ComponentError>;

  /// Flush and finalize the staged output.
  fn close(&mut self) -> Result<(), ComponentError>;

  /// Drop any buffered output. The runner removes the staged files.
  fn abort(&mut self);
}
