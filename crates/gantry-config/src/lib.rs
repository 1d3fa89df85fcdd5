//! Gantry Config
//!
//! This crate contains the data model shared by every stage of task execution:
//!
//! - [`JobState`] - job-level identity and configuration, written by the job
//!   submitter and read once per task
//! - [`WorkUnit`] - one partition of a job's input with its own configuration
//! - [`TaskState`] - the mutable runtime record of a single task attempt
//!
//! Job states and work units are persisted as JSON blobs on shared storage.
//! Configuration maps are [`Properties`], ordered so that serialization is
//! deterministic.

mod error;
mod ids;
mod job;
pub mod keys;
mod properties;
mod task_state;
mod work_unit;

pub use error::ConfigError;
pub use ids::{new_job_id, new_task_id};
pub use job::JobState;
pub use properties::{LayeredProperties, Properties};
pub use task_state::{InvalidTransition, TaskCounts, TaskState, TaskStatus};
pub use work_unit::WorkUnit;
