//! Task execution pool for gantry.
//!
//! This crate provides the [`TaskExecutor`], a bounded pool that runs
//! synchronous units of work on blocking worker threads. Work queued while
//! every worker is busy starts in submission order.
//!
//! The pool's lifecycle is explicit: [`TaskExecutor::start`] creates it inside
//! a tokio runtime and [`TaskExecutor::stop`] drains it. Stopping more than
//! once is a no-op.

mod config;
mod error;
mod executor;

pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use executor::{StopStatus, TaskExecutor, TaskHandle};
