//! Gantry Pipeline
//!
//! This crate runs one work unit through an extract → convert → write
//! pipeline and publishes its output atomically.
//!
//! # Architecture
//!
//! ```text
//! PipelineRunner::run(work, state, progress, cancel)
//! ├── resolve output paths (staging dir distinct from final dir)
//! ├── ComponentRegistry → Extractor, [Converter], Writer
//! ├── per batch: extractor → converter chain → writer, report progress,
//! │   check cancellation
//! ├── writer.close()
//! ├── check cancellation once more
//! └── rename staged file → final location
//! ```
//!
//! Components are chosen by name from the work unit configuration. The
//! built-in set is registered by [`ComponentRegistry::with_builtins`]; hosts
//! add their own with the `register_*` methods.
//!
//! The runner is synchronous and runs on the worker thread that owns the
//! task. Cancellation is cooperative and only observed between batches, so
//! an extractor blocked inside `next_record` delays cancellation until it
//! returns.

pub mod builtin;
mod component;
mod error;
mod paths;
mod progress;
mod registry;
mod runner;

pub use component::{ComponentContext, ComponentError, Converter, Extractor, Record, Writer};
pub use error::{ComponentRole, PipelineError};
pub use paths::OutputPaths;
pub use progress::{NoopListener, ProgressListener};
pub use registry::{ComponentRegistry, ConverterFactory, ExtractorFactory, WriterFactory};
pub use runner::{DEFAULT_BATCH_SIZE, PipelineRunner, PipelineSummary, TaskWork};
