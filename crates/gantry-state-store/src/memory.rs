use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{Error, StateStore};

/// In-process state store.
///
/// Useful for tests and for embedding the bridge without shared storage.
#[derive(Default)]
pub struct MemoryStateStore {
  blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStateStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn contains(&self, path: &str) -> bool {
    self.blobs.read().await.contains_key(path)
  }
}

#[async_trait]
impl StateStore for MemoryStateStore {
  async fn load(&self, path: &str) -> Result<Bytes, Error> {
    self
      .blobs
      .read()
      .await
      .get(path)
      .cloned()
      .ok_or_else(|| Error::NotFound(path.to_string()))
  }

  async fn store(&self, path: &str, data: Bytes) -> Result<(), Error> {
    self.blobs.write().await.insert(path.to_string(), data);
    Ok(())
  }

  async fn delete(&self, path: &str) -> Result<(), Error> {
    self
      .blobs
      .write()
      .await
      .remove(path)
      .map(|_| ())
      .ok_or_else(|| Error::NotFound(path.to_string()))
  }
}
