use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::component::{ComponentError, Extractor, Record};

/// Reads one JSON value per non-blank line.
pub struct JsonLinesExtractor {
  lines: Lines<BufReader<File>>,
  line_no: usize,
}

impl JsonLinesExtractor {
  pub fn open(path: &Path) -> Result<Self, ComponentError> {
    let file = File::open(path)
      .map_err(|e| ComponentError::new(format!("cannot open {}: {}", path.display(), e)))?;
    Ok(Self {
      lines: BufReader::new(file).lines(),
      line_no: 0,
    })
  }
}

impl Extractor for JsonLinesExtractor {
  fn next_record(&mut self) -> Result<Option<Record>, ComponentError> {
    for line in self.lines.by_ref() {
      self.line_no += 1;
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let record = serde_json::from_str(&line)
        .map_err(|e| ComponentError::new(format!("line {}: {}", self.line_no, e)))?;
      return Ok(Some(record));
    }
    Ok(None)
  }
}

// Also usable to read back json-lines output.
impl Iterator for JsonLinesExtractor {
  type Item = Result<Record, ComponentError>;

  fn next(&mut self) -> Option<Self::Item> {
    self.next_record().transpose()
  }
}

/// Reads one string record per line.
pub struct TextLinesExtractor {
  lines: Lines<BufReader<File>>,
}

impl TextLinesExtractor {
  pub fn open(path: &Path) -> Result<Self, ComponentError> {
    let file = File::open(path)
      .map_err(|e| ComponentError::new(format!("cannot open {}: {}", path.display(), e)))?;
    Ok(Self {
      lines: BufReader::new(file).lines(),
    })
  }
}

impl Extractor for TextLinesExtractor {
  fn next_record(&mut self) -> Result<Option<Record>, ComponentError> {
    match self.lines.next() {
      Some(line) => Ok(Some(Record::String(line?))),
      None => Ok(None),
    }
  }
}
