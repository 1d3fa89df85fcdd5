//! Pipeline errors.

use std::fmt;
use std::path::PathBuf;

use gantry_config::{ConfigError, InvalidTransition};

/// Role a component plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRole {
  Extractor,
  Converter,
  Writer,
}

impl fmt::Display for ComponentRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ComponentRole::Extractor => "extractor",
      ComponentRole::Converter => "converter",
      ComponentRole::Writer => "writer",
    };
    f.write_str(s)
  }
}

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  /// The work unit configuration is missing or inconsistent.
  #[error("invalid task configuration: {0}")]
  InvalidConfig(#[from] ConfigError),

  /// Staging and final output locations overlap.
  #[error("staging location {staging} overlaps output location {output}")]
  OverlappingOutput { staging: PathBuf, output: PathBuf },

  /// A named component could not be constructed.
  #[error("failed to instantiate {role} '{name}': {message}")]
  ComponentInstantiation {
    role: ComponentRole,
    name: String,
    message: String,
  },

  /// A component failed while processing records.
  #[error("{role} '{name}' failed: {message}")]
  Processing {
    role: ComponentRole,
    name: String,
    message: String,
  },

  /// The staging directory could not be prepared.
  #[error("failed to prepare staging location {path}: {source}")]
  Staging {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The staged output could not be moved to its final location.
  #[error("failed to publish {staged} to {target}: {source}")]
  Commit {
    staged: PathBuf,
    target: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The task state rejected a status change.
  #[error(transparent)]
  State(#[from] InvalidTransition),

  /// The run stopped at a cancellation checkpoint.
  #[error("task cancelled")]
  Cancelled,
}
