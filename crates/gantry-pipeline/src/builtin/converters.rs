use crate::component::{ComponentError, Converter, Record};

/// Emits every record unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughConverter;

impl Converter for PassthroughConverter {
  fn convert(&self, record: Record) -> Result<Vec<Record>, ComponentError> {
    Ok(vec![record])
  }
}

/// Parses string records as JSON. Non-string records pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl Converter for JsonConverter {
  fn convert(&self, record: Record) -> Result<Vec<Record>, ComponentError> {
    match record {
      Record::String(raw) => Ok(vec![serde_json::from_str(&raw)?]),
      other => Ok(vec![other]),
    }
  }
}

/// Keeps only object records that carry a non-null `field`.
#[derive(Debug, Clone)]
pub struct FilterConverter {
  field: String,
}

impl FilterConverter {
  pub fn new(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
    }
  }
}

impl Converter for FilterConverter {
  fn convert(&self, record: Record) -> Result<Vec<Record>, ComponentError> {
    let keep = record
      .get(&self.field)
      .is_some_and(|value| !value.is_null());
    Ok(if keep { vec![record] } else { Vec::new() })
  }
}

/// Expands an array field into one record per element.
///
/// Each output is the input record with the array replaced by one of its
/// elements. An empty array drops the record; records without the field pass
/// through unchanged.
#[derive(Debug, Clone)]
pub struct FlattenConverter {
  field: String,
}

impl FlattenConverter {
  pub fn new(field: impl Into<String>) -> Self {
    Self {
      field: field.into(),
    }
  }
}

impl Converter for FlattenConverter {
  fn convert(&self, record: Record) -> Result<Vec<Record>, ComponentError> {
    let Some(object) = record.as_object() else {
      return Err(ComponentError::new("flatten expects object records"));
    };

    let elements = match object.get(&self.field) {
      None => return Ok(vec![record]),
      Some(Record::Array(elements)) => elements,
      Some(_) => {
        return Err(ComponentError::new(format!(
          "field '{}' is not an array",
          self.field
        )));
      }
    };

    Ok(
      elements
        .iter()
        .map(|element| {
          let mut out = object.clone();
          out.insert(self.field.clone(), element.clone());
          Record::Object(out)
        })
        .collect(),
    )
  }
}
