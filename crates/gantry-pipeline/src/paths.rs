//! Staging and final output locations of a task.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use gantry_config::{ConfigError, LayeredProperties, keys};
use tracing::warn;

use crate::error::PipelineError;

/// Resolved output locations of one task.
///
/// ```text
/// {writer.staging.dir}/{job-id}/{task-id}/{file-name}      staged
/// {writer.output.dir}/{writer.file.path}/{file-name}       published
/// ```
///
/// The staging directory is scoped by job and task id, so concurrent tasks
/// never share a staging path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
  pub staging_dir: PathBuf,
  pub staging_file: PathBuf,
  pub output_dir: PathBuf,
  pub output_file: PathBuf,
}

impl OutputPaths {
  /// Resolve paths from task configuration.
  ///
  /// Fails if the staging root or the task's staging directory overlaps the
  /// final output directory (compared lexically after normalization). Job
  /// and task ids must each be a single plain path segment.
  pub fn resolve(
    properties: &LayeredProperties<'_>,
    job_id: &str,
    task_id: &str,
  ) -> Result<Self, PipelineError> {
    path_segment(keys::JOB_ID, job_id)?;
    path_segment(keys::TASK_ID, task_id)?;

    let staging_root = normalize(Path::new(properties.require(keys::WRITER_STAGING_DIR)?));
    let output_root = normalize(Path::new(properties.require(keys::WRITER_OUTPUT_DIR)?));

    let output_dir = match properties.get(keys::WRITER_FILE_PATH) {
      Some(rel) => normalize(&output_root.join(rel)),
      None => output_root,
    };

    if overlaps(&staging_root, &output_dir) {
      return Err(PipelineError::OverlappingOutput {
        staging: staging_root,
        output: output_dir,
      });
    }

    let file_name = properties
      .get(keys::WRITER_FILE_NAME)
      .map(str::to_string)
      .unwrap_or_else(|| format!("part-{}.jsonl", task_id));

    let staging_dir = normalize(&staging_root.join(job_id).join(task_id));
    if overlaps(&staging_dir, &output_dir) {
      return Err(PipelineError::OverlappingOutput {
        staging: staging_dir,
        output: output_dir,
      });
    }

    Ok(Self {
      staging_file: staging_dir.join(&file_name),
      output_file: output_dir.join(&file_name),
      staging_dir,
      output_dir,
    })
  }

  /// Create an empty staging directory, clearing leftovers of an earlier attempt.
  pub fn prepare_staging(&self) -> Result<(), PipelineError> {
    let staging = |source| PipelineError::Staging {
      path: self.staging_dir.clone(),
      source,
    };

    match fs::remove_dir_all(&self.staging_dir) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => return Err(staging(e)),
    }
    fs::create_dir_all(&self.staging_dir).map_err(staging)
  }

  /// Move the staged file into the final output location.
  pub fn publish(&self) -> Result<(), PipelineError> {
    let commit = |source| PipelineError::Commit {
      staged: self.staging_file.clone(),
      target: self.output_file.clone(),
      source,
    };

    fs::create_dir_all(&self.output_dir).map_err(commit)?;
    fs::rename(&self.staging_file, &self.output_file).map_err(commit)
  }

  /// Remove the task's staging directory and everything in it.
  pub fn discard_staging(&self) {
    match fs::remove_dir_all(&self.staging_dir) {
      Ok(()) => {}
      Err(e) if e.kind() == io::ErrorKind::NotFound => {}
      Err(e) => {
        warn!(path = %self.staging_dir.display(), error = %e, "failed to discard staging directory");
      }
    }

    // The per-job directory is shared by sibling tasks; only remove it once empty
    if let Some(job_dir) = self.staging_dir.parent() {
      let _ = fs::remove_dir(job_dir);
    }
  }
}

fn overlaps(a: &Path, b: &Path) -> bool {
  a.starts_with(b) || b.starts_with(a)
}

/// Reject ids that would escape or replace their parent directory.
fn path_segment(key: &str, id: &str) -> Result<(), PipelineError> {
  let mut components = Path::new(id).components();
  match (components.next(), components.next()) {
    (Some(Component::Normal(segment)), None) if segment == OsStr::new(id) => Ok(()),
    _ => Err(PipelineError::InvalidConfig(ConfigError::InvalidProperty {
      key: key.to_string(),
      value: id.to_string(),
      message: "must be a single path segment".to_string(),
    })),
  }
}

/// Lexically normalize a path, dropping `.` and folding `..`.
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}
