//! Name → factory registry for pipeline components.

use std::collections::HashMap;
use std::sync::Arc;

use crate::builtin;
use crate::component::{ComponentContext, ComponentError, Converter, Extractor, Writer};
use crate::error::{ComponentRole, PipelineError};

pub type ExtractorFactory =
  Arc<dyn Fn(&ComponentContext<'_>) -> Result<Box<dyn Extractor>, ComponentError> + Send + Sync>;

pub type ConverterFactory =
  Arc<dyn Fn(&ComponentContext<'_>) -> Result<Box<dyn Converter>, ComponentError> + Send + Sync>;

pub type WriterFactory =
  Arc<dyn Fn(&ComponentContext<'_>) -> Result<Box<dyn Writer>, ComponentError> + Send + Sync>;

/// Registry of component factories, one namespace per role.
///
/// Shared read-only between worker threads once built.
#[derive(Default, Clone)]
pub struct ComponentRegistry {
  extractors: HashMap<String, ExtractorFactory>,
  converters: HashMap<String, ConverterFactory>,
  writers: HashMap<String, WriterFactory>,
}

impl ComponentRegistry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a registry holding the built-in components.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    builtin::register(&mut registry);
    registry
  }

  pub fn register_extractor<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
  where
    F: Fn(&ComponentContext<'_>) -> Result<Box<dyn Extractor>, ComponentError> + Send + Sync + 'static,
  {
    self.extractors.insert(name.into(), Arc::new(factory));
    self
  }

  pub fn register_converter<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
  where
    F: Fn(&ComponentContext<'_>) -> Result<Box<dyn Converter>, ComponentError> + Send + Sync + 'static,
  {
    self.converters.insert(name.into(), Arc::new(factory));
    self
  }

  pub fn register_writer<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
  where
    F: Fn(&ComponentContext<'_>) -> Result<Box<dyn Writer>, ComponentError> + Send + Sync + 'static,
  {
    self.writers.insert(name.into(), Arc::new(factory));
    self
  }

  pub fn extractor(
    &self,
    name: &str,
    ctx: &ComponentContext<'_>,
  ) -> Result<Box<dyn Extractor>, PipelineError> {
    build(&self.extractors, ComponentRole::Extractor, name, ctx)
  }

  pub fn converter(
    &self,
    name: &str,
    ctx: &ComponentContext<'_>,
  ) -> Result<Box<dyn Converter>, PipelineError> {
    build(&self.converters, ComponentRole::Converter, name, ctx)
  }

  pub fn writer(&self, name: &str, ctx: &ComponentContext<'_>) -> Result<Box<dyn Writer>, PipelineError> {
    build(&self.writers, ComponentRole::Writer, name, ctx)
  }

  /// Registered names for a role, sorted.
  pub fn names(&self, role: ComponentRole) -> Vec<String> {
    let mut names: Vec<String> = match role {
      ComponentRole::Extractor => self.extractors.keys().cloned().collect(),
      ComponentRole::Converter => self.converters.keys().cloned().collect(),
      ComponentRole::Writer => self.writers.keys().cloned().collect(),
    };
    names.sort();
    names
  }
}

fn build<T: ?Sized>(
  factories: &HashMap<String, Arc<dyn Fn(&ComponentContext<'_>) -> Result<Box<T>, ComponentError> + Send + Sync>>,
  role: ComponentRole,
  name: &str,
  ctx: &ComponentContext<'_>,
) -> Result<Box<T>, PipelineError> {
  let factory = factories
    .get(name)
    .ok_or_else(|| PipelineError::ComponentInstantiation {
      role,
      name: name.to_string(),
      message: "no component registered under this name".to_string(),
    })?;

  factory(ctx).map_err(|e| PipelineError::ComponentInstantiation {
    role,
    name: name.to_string(),
    message: e.message,
  })
}
