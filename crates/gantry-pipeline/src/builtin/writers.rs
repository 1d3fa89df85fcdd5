use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::component::{ComponentError, Record, Writer};

/// Writes one compact JSON document per line.
pub struct JsonLinesWriter {
  out: Option<BufWriter<File>>,
}

impl JsonLinesWriter {
  /// Create (or truncate) `path`.
  pub fn create(path: &Path) -> Result<Self, ComponentError> {
    let file = File::create(path)
      .map_err(|e| ComponentError::new(format!("cannot create {}: {}", path.display(), e)))?;
    Ok(Self {
      out: Some(BufWriter::new(file)),
    })
  }

  fn out(&mut self) -> Result<&mut BufWriter<File>, ComponentError> {
    self
      .out
      .as_mut()
      .ok_or_else(|| ComponentError::new("writer already closed"))
  }
}

impl Writer for JsonLinesWriter {
  fn write(&mut self, record: Record) -> Result<(), ComponentError> {
    let out = self.out()?;
    serde_json::to_writer(&mut *out, &record)?;
    out.write_all(b"\n")?;
    Ok(())
  }

  fn close(&mut self) -> Result<(), ComponentError> {
    let mut out = self
      .out
      .take()
      .ok_or_else(|| ComponentError::new("writer already closed"))?;
    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(())
  }

  fn abort(&mut self) {
    self.out = None;
  }
}
