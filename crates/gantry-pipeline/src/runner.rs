//! Pipeline runner.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use gantry_config::{JobState, LayeredProperties, TaskCounts, TaskState, WorkUnit, keys};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::component::{ComponentContext, ComponentError, Converter, Extractor, Record, Writer};
use crate::error::{ComponentRole, PipelineError};
use crate::paths::OutputPaths;
use crate::progress::ProgressListener;
use crate::registry::ComponentRegistry;

/// Records processed between cancellation checks when `task.batch.size` is unset.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// A fully materialized unit of work.
#[derive(Debug, Clone)]
pub struct TaskWork {
  pub job: JobState,
  pub work_unit: WorkUnit,
}

/// Summary of a committed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
  pub counts: TaskCounts,
  pub output: PathBuf,
}

impl fmt::Display for PipelineSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "read {} records, converted {}, wrote {} to {}",
      self.counts.read,
      self.counts.converted,
      self.counts.written,
      self.output.display()
    )
  }
}

/// Runs work units through extractor → converter chain → writer.
#[derive(Clone)]
pub struct PipelineRunner {
  registry: Arc<ComponentRegistry>,
}

struct Components {
  extractor_name: String,
  extractor: Box<dyn Extractor>,
  converters: Vec<(String, Box<dyn Converter>)>,
  writer_name: String,
  writer: Box<dyn Writer>,
}

/// Removes the task's staging directory when the run ends, however it ends.
struct StagingGuard<'a>(&'a OutputPaths);

impl Drop for StagingGuard<'_> {
  fn drop(&mut self) {
    self.0.discard_staging();
  }
}

impl PipelineRunner {
  pub fn new(registry: Arc<ComponentRegistry>) -> Self {
    Self { registry }
  }

  pub fn registry(&self) -> &ComponentRegistry {
    &self.registry
  }

  /// Run one task to a terminal state.
  ///
  /// `state` must be PENDING. On return it is COMMITTED, FAILED, or
  /// CANCELLED and `progress` has seen the terminal snapshot. Errors are
  /// returned rather than retried; a cancelled run returns
  /// [`PipelineError::Cancelled`].
  #[instrument(
    name = "pipeline_run",
    skip_all,
    fields(job_id = %state.job_id, task_id = %state.task_id)
  )]
  pub fn run(
    &self,
    work: &TaskWork,
    state: &mut TaskState,
    progress: &dyn ProgressListener,
    cancel: &CancellationToken,
  ) -> Result<PipelineSummary, PipelineError> {
    state.start()?;
    progress.on_progress(&state.task_id, state);
    info!("task started");

    let result = self.run_inner(work, state, progress, cancel);

    match &result {
      Ok(summary) => {
        state.commit()?;
        info!(
          read = summary.counts.read,
          written = summary.counts.written,
          output = %summary.output.display(),
          "task committed"
        );
      }
      Err(PipelineError::Cancelled) => {
        state.cancel()?;
        warn!(read = state.counts.read, "task cancelled");
      }
      Err(e) => {
        state.fail(e.to_string())?;
        error!(error = %e, "task failed");
      }
    }

    progress.on_progress(&state.task_id, state);
    result
  }

  fn run_inner(
    &self,
    work: &TaskWork,
    state: &mut TaskState,
    progress: &dyn ProgressListener,
    cancel: &CancellationToken,
  ) -> Result<PipelineSummary, PipelineError> {
    let properties = LayeredProperties::new(&work.work_unit.properties, &work.job.properties);
    let paths = OutputPaths::resolve(&properties, &state.job_id, &state.task_id)?;
    let batch_size = properties.get_usize(keys::TASK_BATCH_SIZE, DEFAULT_BATCH_SIZE)?;

    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }

    paths.prepare_staging()?;
    let _staging = StagingGuard(&paths);

    let ctx = ComponentContext {
      job_id: &state.job_id,
      task_id: &state.task_id,
      properties,
      staging_file: &paths.staging_file,
    };
    let mut components = self.instantiate(&ctx)?;

    if let Err(e) = process(&mut components, state, progress, cancel, batch_size) {
      components.writer.abort();
      return Err(e);
    }

    if let Err(e) = components.writer.close() {
      components.writer.abort();
      return Err(processing(ComponentRole::Writer, &components.writer_name, e));
    }

    // A cancelled task must never publish, even after its last batch
    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }
    paths.publish()?;

    Ok(PipelineSummary {
      counts: state.counts,
      output: paths.output_file.clone(),
    })
  }

  fn instantiate(&self, ctx: &ComponentContext<'_>) -> Result<Components, PipelineError> {
    let extractor_name = required_name(ctx, keys::SOURCE_CLASS, ComponentRole::Extractor)?;
    let writer_name = required_name(ctx, keys::WRITER_BUILDER_CLASS, ComponentRole::Writer)?;

    let extractor = self.registry.extractor(&extractor_name, ctx)?;

    let converters = ctx
      .properties
      .get_list(keys::CONVERTER_CLASSES)
      .into_iter()
      .map(|name| Ok((name.to_string(), self.registry.converter(name, ctx)?)))
      .collect::<Result<Vec<_>, PipelineError>>()?;

    let writer = self.registry.writer(&writer_name, ctx)?;

    Ok(Components {
      extractor_name,
      extractor,
      converters,
      writer_name,
      writer,
    })
  }
}

fn required_name(
  ctx: &ComponentContext<'_>,
  key: &str,
  role: ComponentRole,
) -> Result<String, PipelineError> {
  ctx
    .properties
    .get(key)
    .map(str::to_string)
    .ok_or_else(|| PipelineError::ComponentInstantiation {
      role,
      name: String::new(),
      message: format!("no {} configured (set '{}')", role, key),
    })
}

fn processing(role: ComponentRole, name: &str, e: ComponentError) -> PipelineError {
  PipelineError::Processing {
    role,
    name: name.to_string(),
    message: e.message,
  }
}

/// Pull, convert, and write records batch by batch until the extractor is
/// exhausted or cancellation is observed at a batch boundary.
fn process(
  c: &mut Components,
  state: &mut TaskState,
  progress: &dyn ProgressListener,
  cancel: &CancellationToken,
  batch_size: usize,
) -> Result<(), PipelineError> {
  loop {
    if cancel.is_cancelled() {
      return Err(PipelineError::Cancelled);
    }

    let mut exhausted = false;
    for _ in 0..batch_size {
      let record = c
        .extractor
        .next_record()
        .map_err(|e| processing(ComponentRole::Extractor, &c.extractor_name, e))?;

      let Some(record) = record else {
        exhausted = true;
        break;
      };
      state.counts.read += 1;

      let converted = convert(&c.converters, record)?;
      state.counts.converted += converted.len() as u64;

      for record in converted {
        c.writer
          .write(record)
          .map_err(|e| processing(ComponentRole::Writer, &c.writer_name, e))?;
        state.counts.written += 1;
      }
    }

    progress.on_progress(&state.task_id, state);

    if exhausted {
      return Ok(());
    }
  }
}

fn convert(
  converters: &[(String, Box<dyn Converter>)],
  record: Record,
) -> Result<Vec<Record>, PipelineError> {
  let mut records = vec![record];

  for (name, converter) in converters {
    let mut next = Vec::with_capacity(records.len());
    for record in records {
      next.extend(
        converter
          .convert(record)
          .map_err(|e| processing(ComponentRole::Converter, name, e))?,
      );
    }
    if next.is_empty() {
      return Ok(next);
    }
    records = next;
  }

  Ok(records)
}
