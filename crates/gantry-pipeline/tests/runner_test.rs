//! Integration tests for PipelineRunner using filesystem fixtures.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gantry_config::{JobState, TaskState, TaskStatus, WorkUnit, keys};
use gantry_pipeline::builtin::JsonLinesExtractor;
use gantry_pipeline::{
  ComponentError, ComponentRegistry, Extractor, NoopListener, PipelineError, PipelineRunner,
  ProgressListener, Record, TaskWork, Writer,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const JOB_ID: &str = "job_runner_test_1";
const TASK_ID: &str = "task_runner_test_1_0";

const SOURCE_JSON_DOCS: &str = "{\"name\": \"Alyssa\", \"favorite_number\": 256, \"favorite_color\": \"yellow\"}\n\
{\"name\": \"Ben\", \"favorite_number\": 7, \"favorite_color\": \"red\"}\n\
{\"name\": \"Charlie\", \"favorite_number\": 68, \"favorite_color\": \"blue\"}";

struct Fixture {
  dir: tempfile::TempDir,
}

impl Fixture {
  fn new() -> Self {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    std::fs::write(dir.path().join("source.json"), SOURCE_JSON_DOCS).unwrap();
    Self { dir }
  }

  fn staging_root(&self) -> PathBuf {
    self.dir.path().join("staging")
  }

  fn output_root(&self) -> PathBuf {
    self.dir.path().join("output")
  }

  fn staging_dir(&self) -> PathBuf {
    self.staging_root().join(JOB_ID).join(TASK_ID)
  }

  fn output_file(&self) -> PathBuf {
    self.output_root().join("json").join("users.jsonl")
  }

  fn work(&self, converters: &str) -> TaskWork {
    let job = JobState::new("runner_test", JOB_ID)
      .with_property(keys::WRITER_STAGING_DIR, self.staging_root().to_str().unwrap());

    let work_unit = WorkUnit::new()
      .with_property(keys::TASK_ID, TASK_ID)
      .with_property(keys::SOURCE_CLASS, "json-lines")
      .with_property(
        keys::SOURCE_FILE,
        self.dir.path().join("source.json").to_str().unwrap(),
      )
      .with_property(keys::CONVERTER_CLASSES, converters)
      .with_property(keys::WRITER_BUILDER_CLASS, "json-lines")
      .with_property(keys::WRITER_OUTPUT_DIR, self.output_root().to_str().unwrap())
      .with_property(keys::WRITER_FILE_PATH, "json")
      .with_property(keys::WRITER_FILE_NAME, "users.jsonl");

    TaskWork { job, work_unit }
  }
}

fn new_state() -> TaskState {
  TaskState::new(TASK_ID, JOB_ID, "runner_test")
}

fn read_output(path: &Path) -> Vec<Record> {
  JsonLinesExtractor::open(path)
    .unwrap()
    .map(|r| r.unwrap())
    .collect()
}

fn run(
  runner: &PipelineRunner,
  work: &TaskWork,
  state: &mut TaskState,
) -> Result<gantry_pipeline::PipelineSummary, PipelineError> {
  runner.run(work, state, &NoopListener, &CancellationToken::new())
}

#[test]
fn test_passthrough_publishes_records_in_order() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let mut state = new_state();

  let summary = run(&runner, &fixture.work("passthrough"), &mut state).unwrap();

  assert_eq!(state.status, TaskStatus::Committed);
  assert_eq!(state.counts.read, 3);
  assert_eq!(state.counts.written, 3);
  assert_eq!(summary.output, fixture.output_file());

  let mut reader = JsonLinesExtractor::open(&fixture.output_file()).unwrap();
  let names: Vec<String> = reader
    .by_ref()
    .take(3)
    .map(|r| r.unwrap()["name"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(names, vec!["Alyssa", "Ben", "Charlie"]);
  assert!(reader.next().is_none());

  assert!(!fixture.staging_dir().exists());
}

#[test]
fn test_converter_chain_counts_surviving_records() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let mut work = fixture.work("passthrough,filter");
  work
    .work_unit
    .set_property(keys::CONVERTER_FILTER_FIELD, "nickname");
  let mut state = new_state();

  run(&runner, &work, &mut state).unwrap();

  assert_eq!(state.counts.read, 3);
  assert_eq!(state.counts.converted, 0);
  assert_eq!(state.counts.written, 0);
  assert!(read_output(&fixture.output_file()).is_empty());
}

#[test]
fn test_cancelled_before_start_leaves_no_output() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let mut state = new_state();
  let cancel = CancellationToken::new();
  cancel.cancel();

  let err = runner
    .run(&fixture.work("passthrough"), &mut state, &NoopListener, &cancel)
    .unwrap_err();

  assert!(matches!(err, PipelineError::Cancelled));
  assert_eq!(state.status, TaskStatus::Cancelled);
  assert_eq!(state.counts.read, 0);
  assert!(!fixture.staging_dir().exists());
  assert!(!fixture.output_file().exists());
}

/// Yields one record, then fails.
struct FailAfterOne {
  yielded: bool,
}

impl Extractor for FailAfterOne {
  fn next_record(&mut self) -> Result<Option<Record>, ComponentError> {
    if self.yielded {
      return Err(ComponentError::new("source connection reset"));
    }
    self.yielded = true;
    Ok(Some(json!({"name": "Alyssa"})))
  }
}

#[test]
fn test_extractor_failure_discards_staging() {
  let fixture = Fixture::new();
  let mut registry = ComponentRegistry::with_builtins();
  registry.register_extractor("fail-after-one", |_| Ok(Box::new(FailAfterOne { yielded: false })));
  let runner = PipelineRunner::new(Arc::new(registry));

  let mut work = fixture.work("passthrough");
  work.work_unit.set_property(keys::SOURCE_CLASS, "fail-after-one");
  let mut state = new_state();

  let err = run(&runner, &work, &mut state).unwrap_err();

  match &err {
    PipelineError::Processing { name, message, .. } => {
      assert_eq!(name, "fail-after-one");
      assert_eq!(message, "source connection reset");
    }
    other => panic!("unexpected error: {}", other),
  }
  assert_eq!(state.status, TaskStatus::Failed);
  assert!(state.error.as_deref().unwrap().contains("fail-after-one"));
  assert_eq!(state.counts.written, 1);
  assert!(!fixture.output_file().exists());
  assert!(!fixture.staging_dir().exists());
}

/// Accepts records but fails to finalize.
struct FailOnClose;

impl Writer for FailOnClose {
  fn write(&mut self, _record: Record) -> Result<(), ComponentError> {
    Ok(())
  }

  fn close(&mut self) -> Result<(), ComponentError> {
    Err(ComponentError::new("disk quota exceeded"))
  }

  fn abort(&mut self) {}
}

#[test]
fn test_writer_close_failure_publishes_nothing() {
  let fixture = Fixture::new();
  let mut registry = ComponentRegistry::with_builtins();
  registry.register_writer("fail-on-close", |ctx| {
    // Leave a staged file behind so discard has something to remove
    std::fs::write(ctx.staging_file, b"partial")?;
    Ok(Box::new(FailOnClose))
  });
  let runner = PipelineRunner::new(Arc::new(registry));

  let mut work = fixture.work("passthrough");
  work
    .work_unit
    .set_property(keys::WRITER_BUILDER_CLASS, "fail-on-close");
  let mut state = new_state();

  let err = run(&runner, &work, &mut state).unwrap_err();

  assert!(matches!(err, PipelineError::Processing { .. }));
  assert_eq!(state.status, TaskStatus::Failed);
  assert!(!fixture.output_file().exists());
  assert!(!fixture.staging_dir().exists());
}

#[test]
fn test_publish_failure_is_commit_error() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));

  // A non-empty directory where the output file should go makes the rename fail
  std::fs::create_dir_all(fixture.output_file().join("occupied")).unwrap();
  let mut state = new_state();

  let err = run(&runner, &fixture.work("passthrough"), &mut state).unwrap_err();

  assert!(matches!(err, PipelineError::Commit { .. }));
  assert_eq!(state.status, TaskStatus::Failed);
  assert!(fixture.output_file().is_dir());
  assert!(!fixture.staging_dir().exists());
}

#[test]
fn test_unknown_component_fails_instantiation() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let mut state = new_state();

  let err = run(&runner, &fixture.work("passthrough,avro"), &mut state).unwrap_err();

  assert!(matches!(err, PipelineError::ComponentInstantiation { ref name, .. } if name == "avro"));
  assert_eq!(state.status, TaskStatus::Failed);
  assert!(!fixture.staging_dir().exists());
}

#[test]
fn test_overlapping_output_rejected_before_reading() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let mut work = fixture.work("passthrough");
  work.work_unit.set_property(
    keys::WRITER_STAGING_DIR,
    fixture.output_root().to_str().unwrap(),
  );
  let mut state = new_state();

  let err = run(&runner, &work, &mut state).unwrap_err();

  assert!(matches!(err, PipelineError::OverlappingOutput { .. }));
  assert_eq!(state.counts.read, 0);
}

/// Records every snapshot it receives.
#[derive(Default)]
struct Recorder {
  snapshots: Mutex<Vec<TaskState>>,
}

impl ProgressListener for Recorder {
  fn on_progress(&self, _task_id: &str, state: &TaskState) {
    self.snapshots.lock().unwrap().push(state.clone());
  }
}

#[test]
fn test_progress_reported_per_batch() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let mut work = fixture.work("passthrough");
  work.work_unit.set_property(keys::TASK_BATCH_SIZE, "1");
  let recorder = Recorder::default();
  let mut state = new_state();

  runner
    .run(&work, &mut state, &recorder, &CancellationToken::new())
    .unwrap();

  let snapshots = recorder.snapshots.lock().unwrap();
  let statuses: Vec<TaskStatus> = snapshots.iter().map(|s| s.status).collect();
  let reads: Vec<u64> = snapshots.iter().map(|s| s.counts.read).collect();

  // start, one per record, the exhausting batch, then the terminal snapshot
  assert_eq!(statuses.first(), Some(&TaskStatus::Running));
  assert_eq!(statuses.last(), Some(&TaskStatus::Committed));
  assert_eq!(reads, vec![0, 1, 2, 3, 3, 3]);
}

/// Cancels the shared token after yielding `limit` records.
struct CancelAfter {
  cancel: CancellationToken,
  limit: usize,
  yielded: usize,
}

impl Extractor for CancelAfter {
  fn next_record(&mut self) -> Result<Option<Record>, ComponentError> {
    self.yielded += 1;
    if self.yielded == self.limit {
      self.cancel.cancel();
    }
    Ok(Some(json!({"n": self.yielded})))
  }
}

#[test]
fn test_cancellation_observed_at_batch_boundary() {
  let fixture = Fixture::new();
  let cancel = CancellationToken::new();
  let mut registry = ComponentRegistry::with_builtins();
  let token = cancel.clone();
  registry.register_extractor("endless", move |_| {
    Ok(Box::new(CancelAfter {
      cancel: token.clone(),
      limit: 3,
      yielded: 0,
    }))
  });
  let runner = PipelineRunner::new(Arc::new(registry));

  let mut work = fixture.work("passthrough");
  work.work_unit.set_property(keys::SOURCE_CLASS, "endless");
  work.work_unit.set_property(keys::TASK_BATCH_SIZE, "2");
  let mut state = new_state();

  let err = runner
    .run(&work, &mut state, &NoopListener, &cancel)
    .unwrap_err();

  assert!(matches!(err, PipelineError::Cancelled));
  assert_eq!(state.status, TaskStatus::Cancelled);
  // Cancelled during the second batch, which still runs to its end
  assert_eq!(state.counts.read, 4);
  assert!(!fixture.staging_dir().exists());
  assert!(!fixture.output_file().exists());
}

/// Yields `records` records, cancels the shared token, then reports exhaustion.
struct CancelOnExhaustion {
  cancel: CancellationToken,
  records: usize,
}

impl Extractor for CancelOnExhaustion {
  fn next_record(&mut self) -> Result<Option<Record>, ComponentError> {
    if self.records == 0 {
      self.cancel.cancel();
      return Ok(None);
    }
    self.records -= 1;
    Ok(Some(json!({"name": "Alyssa"})))
  }
}

#[test]
fn test_cancellation_after_last_batch_publishes_nothing() {
  let fixture = Fixture::new();
  let cancel = CancellationToken::new();
  let mut registry = ComponentRegistry::with_builtins();
  let token = cancel.clone();
  registry.register_extractor("cancel-on-exhaustion", move |_| {
    Ok(Box::new(CancelOnExhaustion {
      cancel: token.clone(),
      records: 2,
    }))
  });
  let runner = PipelineRunner::new(Arc::new(registry));

  let mut work = fixture.work("passthrough");
  work
    .work_unit
    .set_property(keys::SOURCE_CLASS, "cancel-on-exhaustion");
  let mut state = new_state();

  let err = runner
    .run(&work, &mut state, &NoopListener, &cancel)
    .unwrap_err();

  assert!(matches!(err, PipelineError::Cancelled));
  assert_eq!(state.status, TaskStatus::Cancelled);
  assert_eq!(state.counts.written, 2);
  assert!(!fixture.output_file().exists());
  assert!(!fixture.staging_dir().exists());
}

#[test]
fn test_unsafe_task_id_rejected_before_staging() {
  let fixture = Fixture::new();
  let runner = PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins()));
  let work = fixture.work("passthrough");
  let mut state = TaskState::new("../../output", JOB_ID, "runner_test");

  let err = run(&runner, &work, &mut state).unwrap_err();

  assert!(matches!(err, PipelineError::InvalidConfig(_)), "{}", err);
  assert_eq!(state.status, TaskStatus::Failed);
  assert!(!fixture.staging_root().exists());
}
