//! Job and task identifier conventions.

use chrono::Utc;

/// Create a job id of the form `job_<name>_<epoch-millis>`.
pub fn new_job_id(job_name: &str) -> String {
  format!("job_{}_{}", job_name, Utc::now().timestamp_millis())
}

/// Create the id of the `seq`-th task of a job.
///
/// The `job_` prefix of the job id is replaced by `task_`, so
/// `job_wordcount_1700000000000` becomes `task_wordcount_1700000000000_3`.
pub fn new_task_id(job_id: &str, seq: usize) -> String {
  let body = job_id.strip_prefix("job_").unwrap_or(job_id);
  format!("task_{}_{}", body, seq)
}
