//! Gantry Bridge
//!
//! The adapter invoked once per cluster-assigned task. An
//! [`ExecutionBridge`] turns an opaque [`ClusterTaskHandle`] into a concrete
//! unit of work, runs it on the shared task executor and translates the
//! outcome into the [`TaskResult`] the scheduler understands.
//!
//! ```text
//! ClusterTaskHandle
//!   └── prepare: validate handle → load job state → load work unit
//!         └── run: register with tracker → submit to executor
//!               ├── pipeline reaches a terminal state → TaskResult
//!               └── scheduler cancels → cancel pipeline, wait out grace
//! ```

mod bridge;
mod error;
mod handle;
mod result;

pub use bridge::{BridgeConfig, DEFAULT_CANCEL_GRACE, ExecutionBridge, PreparedTask};
pub use error::BridgeError;
pub use handle::{ClusterTaskHandle, TaskConfig};
pub use result::{TaskResult, TaskResultStatus};
