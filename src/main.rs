use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gantry_bridge::{BridgeConfig, ClusterTaskHandle, ExecutionBridge};
use gantry_config::keys;
use gantry_pipeline::{ComponentRegistry, PipelineRunner};
use gantry_state_store::FsStateStore;
use gantry_task_executor::{ExecutorConfig, StopStatus, TaskExecutor};
use gantry_tracker::TaskStateTracker;

/// Gantry - runs cluster-assigned data processing tasks
#[derive(Parser)]
#[command(name = "gantry")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the application work directory (default: ~/.gantry)
  #[arg(long, global = true)]
  work_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a single task handle locally
  Run {
    /// Job the task belongs to
    #[arg(long)]
    job_id: String,

    /// Location of the serialized work unit, relative to the work directory
    #[arg(long)]
    work_unit: String,

    /// Number of tasks allowed to run at once
    #[arg(long)]
    pool_size: Option<usize>,

    /// How long a cancelled task may take to stop before it is abandoned
    #[arg(long, default_value_t = 10_000)]
    cancel_grace_ms: u64,

    /// Interval between progress log lines
    #[arg(long, default_value_t = 1_000, value_parser = clap::value_parser!(u64).range(1..))]
    report_interval_ms: u64,
  },
}

struct RunArgs {
  job_id: String,
  work_unit: String,
  pool_size: Option<usize>,
  cancel_grace: Duration,
  report_interval: Duration,
}

fn main() -> Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let work_dir = match cli.work_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".gantry"),
  };
  let work_dir = std::path::absolute(&work_dir)
    .with_context(|| format!("invalid work directory: {}", work_dir.display()))?;

  match cli.command {
    Some(Commands::Run {
      job_id,
      work_unit,
      pool_size,
      cancel_grace_ms,
      report_interval_ms,
    }) => {
      let args = RunArgs {
        job_id,
        work_unit,
        pool_size,
        cancel_grace: Duration::from_millis(cancel_grace_ms),
        report_interval: Duration::from_millis(report_interval_ms),
      };
      let rt = tokio::runtime::Runtime::new()?;
      let code = rt.block_on(run_task(args, work_dir));
      shutdown_runtime(rt);
      code
    }
    None => {
      println!("gantry - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

/// Upper bound on waiting for abandoned workers once the task has finished.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Drop the runtime without waiting on blocking threads that never return.
fn shutdown_runtime(rt: tokio::runtime::Runtime) {
  rt.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
}

/// Executor stop waits no longer than a cancelled task's grace period.
fn executor_config(args: &RunArgs) -> ExecutorConfig {
  let config = ExecutorConfig::default().with_shutdown_timeout(args.cancel_grace);
  match args.pool_size {
    Some(pool_size) => config.with_pool_size(pool_size),
    None => config,
  }
}

async fn run_task(args: RunArgs, work_dir: PathBuf) -> Result<ExitCode> {
  let executor =
    TaskExecutor::start(executor_config(&args)).context("failed to start task executor")?;

  let tracker = Arc::new(TaskStateTracker::new());
  tracker.start_reporting(args.report_interval);

  let bridge = ExecutionBridge::new(
    Arc::new(FsStateStore::new(&work_dir)),
    executor.clone(),
    tracker.clone(),
    PipelineRunner::new(Arc::new(ComponentRegistry::with_builtins())),
    BridgeConfig::new(&work_dir).with_cancel_grace(args.cancel_grace),
  );

  let handle = ClusterTaskHandle::new(HashMap::from([
    (keys::JOB_ID.to_string(), args.job_id),
    (keys::WORK_UNIT_FILE_PATH.to_string(), args.work_unit),
  ]));

  let cancel = CancellationToken::new();
  {
    let cancel = cancel.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received, cancelling task");
        cancel.cancel();
      }
    });
  }

  info!(work_dir = %work_dir.display(), "running task");
  let result = bridge.execute(&handle, &cancel).await;

  // After a cancel nothing is worth draining
  if executor.stop(!cancel.is_cancelled()).await == StopStatus::TimedOut {
    warn!("abandoned work still running at exit");
  }
  tracker.shutdown().await;

  println!("{}", serde_json::to_string_pretty(&result)?);

  Ok(if result.is_completed() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}
