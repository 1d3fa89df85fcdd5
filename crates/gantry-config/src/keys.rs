//! Well-known configuration keys.
//!
//! Handle keys are read from the scheduler-supplied task configuration; all
//! other keys are read from work unit properties layered over job properties.

/// Job identifier, present on the task handle and on the work unit.
pub const JOB_ID: &str = "job.id";

/// Location of the serialized work unit blob, present on the task handle.
pub const WORK_UNIT_FILE_PATH: &str = "work.unit.file.path";

/// Task identifier, unique within the job.
pub const TASK_ID: &str = "task.id";

/// Registered name of the extractor.
pub const SOURCE_CLASS: &str = "source.class";

/// Input file read by the file-based extractors.
pub const SOURCE_FILE: &str = "source.file";

/// Comma-separated, ordered list of converter names.
pub const CONVERTER_CLASSES: &str = "converter.classes";

/// Field that must be present for the filter converter to keep a record.
pub const CONVERTER_FILTER_FIELD: &str = "converter.filter.field";

/// Array field expanded by the flatten converter.
pub const CONVERTER_FLATTEN_FIELD: &str = "converter.flatten.field";

/// Registered name of the writer.
pub const WRITER_BUILDER_CLASS: &str = "writer.builder.class";

/// Root directory under which per-task staging directories are created.
pub const WRITER_STAGING_DIR: &str = "writer.staging.dir";

/// Root directory of the final, published output.
pub const WRITER_OUTPUT_DIR: &str = "writer.output.dir";

/// Optional relative directory below the output root. Staging ignores it.
pub const WRITER_FILE_PATH: &str = "writer.file.path";

/// Output file name. Defaults to `part-<task-id>.jsonl`.
pub const WRITER_FILE_NAME: &str = "writer.file.name";

/// Number of extracted records processed between cancellation checks.
pub const TASK_BATCH_SIZE: &str = "task.batch.size";

