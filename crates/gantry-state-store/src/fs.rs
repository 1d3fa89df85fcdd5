use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{Error, StateStore};

/// Filesystem-based state store.
///
/// Relative paths resolve against `base_path`; absolute paths are used as-is.
/// Parent directories are created on store. Each store writes a sibling
/// temporary file and renames it into place, so a concurrent `load` sees
/// either the old blob or the new one.
pub struct FsStateStore {
  base_path: PathBuf,
}

impl FsStateStore {
  /// Create a new filesystem store with the given base path.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  fn resolve(&self, path: &str) -> PathBuf {
    self.base_path.join(path)
  }
}

fn not_found(path: &str, e: std::io::Error) -> Error {
  if e.kind() == std::io::ErrorKind::NotFound {
    Error::NotFound(path.to_string())
  } else {
    Error::Io(e)
  }
}

#[async_trait]
impl StateStore for FsStateStore {
  async fn load(&self, path: &str) -> Result<Bytes, Error> {
    let resolved = self.resolve(path);
    let data = fs::read(&resolved).await.map_err(|e| not_found(path, e))?;
    debug!(path = %resolved.display(), bytes = data.len(), "state loaded");
    Ok(Bytes::from(data))
  }

  async fn store(&self, path: &str, data: Bytes) -> Result<(), Error> {
    let resolved = self.resolve(path);

    if let Some(parent) = resolved.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut tmp = resolved.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = File::create(&tmp).await?;
    file.write_all(&data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, &resolved).await?;
    debug!(path = %resolved.display(), bytes = data.len(), "state stored");
    Ok(())
  }

  async fn delete(&self, path: &str) -> Result<(), Error> {
    let resolved = self.resolve(path);
    fs::remove_file(&resolved)
      .await
      .map_err(|e| not_found(path, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_store_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStateStore::new(dir.path());

    store
      .store("nested/job.state", Bytes::from_static(b"{\"a\":1}"))
      .await
      .unwrap();

    let data = store.load("nested/job.state").await.unwrap();
    assert_eq!(&data[..], b"{\"a\":1}");
    assert!(!dir.path().join("nested/job.state.tmp").exists());
  }

  #[tokio::test]
  async fn test_repeated_load_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStateStore::new(dir.path());
    store
      .store("job.state", Bytes::from_static(b"payload"))
      .await
      .unwrap();

    let first = store.load("job.state").await.unwrap();
    let second = store.load("job.state").await.unwrap();
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_load_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsStateStore::new(dir.path());

    let err = store.load("nope.state").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(ref p) if p == "nope.state"));
  }

  #[tokio::test]
  async fn test_absolute_path_ignores_base() {
    let base = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let store = FsStateStore::new(base.path());

    let target = other.path().join("wu.json");
    let target = target.to_str().unwrap();
    store.store(target, Bytes::from_static(b"x")).await.unwrap();

    assert!(other.path().join("wu.json").exists());
    store.delete(target).await.unwrap();
    assert!(matches!(
      store.delete(target).await,
      Err(Error::NotFound(_))
    ));
  }
}
