//! Gantry State Store
//!
//! This crate provides the blob storage client used to read job and work unit
//! state from shared storage. The store is pure I/O: it does not interpret
//! the bytes it moves and it never retries. Callers decide retry policy.
//!
//! The [`StateStore`] trait is the seam to the shared filesystem. [`FsStateStore`]
//! stores blobs as files and [`MemoryStateStore`] keeps them in process.

mod fs;
mod memory;

pub use fs::FsStateStore;
pub use memory::MemoryStateStore;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

/// Error type for state store operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// No blob exists at the requested path.
  #[error("state not found: {0}")]
  NotFound(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Blob storage keyed by path.
///
/// A successful `store` is visible to every subsequent `load` of the same
/// path, from any node sharing the storage.
#[async_trait]
pub trait StateStore: Send + Sync {
  /// Read the blob stored at `path`.
  async fn load(&self, path: &str) -> Result<Bytes, Error>;

  /// Write `data` at `path`, replacing any previous blob.
  async fn store(&self, path: &str, data: Bytes) -> Result<(), Error>;

  /// Remove the blob at `path`.
  async fn delete(&self, path: &str) -> Result<(), Error>;
}

/// Path of a job's serialized state: `<app-work-dir>/<job-id>.job.state`.
pub fn job_state_path(app_work_dir: &Path, job_id: &str) -> PathBuf {
  app_work_dir.join(format!("{}.{}", job_id, JOB_STATE_FILE_SUFFIX))
}

const JOB_STATE_FILE_SUFFIX: &str = "job.state";
