//! Gantry Tracker
//!
//! Keeps the latest known [`TaskState`](gantry_config::TaskState) of every
//! in-flight task. The pipeline runner pushes snapshots through
//! [`ProgressListener`](gantry_pipeline::ProgressListener); readers take
//! point-in-time copies with [`TaskStateTracker::snapshot`].

mod tracker;

pub use tracker::TaskStateTracker;
