//! Task executor implementation.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of [`TaskExecutor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
  /// All accepted work reached a terminal state.
  Drained,
  /// The shutdown timeout elapsed with work still running.
  TimedOut,
  /// The executor had already been stopped.
  AlreadyStopped,
}

/// Handle to one submitted unit of work.
///
/// Await it to get the value returned by the work.
pub struct TaskHandle<T> {
  id: u64,
  cancel: CancellationToken,
  rx: oneshot::Receiver<Result<T, ExecutorError>>,
}

impl<T> TaskHandle<T> {
  /// Sequence number assigned at submission.
  pub fn id(&self) -> u64 {
    self.id
  }

  /// Request cooperative cancellation of this unit of work.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// The token passed to the unit of work.
  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  /// Wait for the work to finish and return its value.
  pub async fn wait(self) -> Result<T, ExecutorError> {
    self.await
  }
}

impl<T> Future for TaskHandle<T> {
  type Output = Result<T, ExecutorError>;

  fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    Pin::new(&mut self.rx)
      .poll(cx)
      .map(|r| r.unwrap_or(Err(ExecutorError::Dropped)))
  }
}

/// Bounded pool running synchronous work on blocking threads.
///
/// A single dispatcher pulls submissions off an unbounded queue in order and
/// waits for a free slot before starting each one, so queued work starts
/// FIFO once all `pool_size` slots are busy.
pub struct TaskExecutor {
  config: ExecutorConfig,
  queue: Mutex<Option<mpsc::UnboundedSender<Job>>>,
  tracker: TaskTracker,
  shutdown: CancellationToken,
  stopped: AtomicBool,
  next_id: AtomicU64,
  queued: Arc<AtomicUsize>,
  running: Arc<AtomicUsize>,
}

impl TaskExecutor {
  /// Create the pool and start its dispatcher.
  ///
  /// Must be called from within a tokio runtime.
  pub fn start(config: ExecutorConfig) -> Result<Arc<Self>, ExecutorError> {
    if config.pool_size == 0 {
      return Err(ExecutorError::InvalidConfig {
        message: "pool_size must be at least 1".to_string(),
      });
    }
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let tracker = TaskTracker::new();
    let queued = Arc::new(AtomicUsize::new(0));
    let running = Arc::new(AtomicUsize::new(0));

    let permits = Arc::new(Semaphore::new(config.pool_size));
    tracker.spawn_on(
      dispatch(rx, permits, tracker.clone(), queued.clone(), running.clone()),
      &runtime,
    );

    info!(pool_size = config.pool_size, "task executor started");

    Ok(Arc::new(Self {
      config,
      queue: Mutex::new(Some(tx)),
      tracker,
      shutdown: CancellationToken::new(),
      stopped: AtomicBool::new(false),
      next_id: AtomicU64::new(0),
      queued,
      running,
    }))
  }

  pub fn config(&self) -> &ExecutorConfig {
    &self.config
  }

  /// Queue a unit of work.
  ///
  /// The work receives a cancellation token that fires when the handle is
  /// cancelled or the executor is stopped non-gracefully. It should check the
  /// token at its own checkpoints; it is never interrupted.
  pub fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>, ExecutorError>
  where
    F: FnOnce(CancellationToken) -> T + Send + 'static,
    T: Send + 'static,
  {
    let queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
    let sender = queue.as_ref().ok_or(ExecutorError::Closed)?;

    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
    let cancel = self.shutdown.child_token();
    let (tx, rx) = oneshot::channel();

    let token = cancel.clone();
    let job: Job = Box::new(move || {
      let result = catch_unwind(AssertUnwindSafe(|| work(token))).map_err(|payload| {
        let message = payload
          .downcast_ref::<&str>()
          .map(|s| s.to_string())
          .or_else(|| payload.downcast_ref::<String>().cloned())
          .unwrap_or_else(|| "unknown panic".to_string());
        warn!(task = id, %message, "task panicked");
        ExecutorError::Panicked { message }
      });
      // The receiver may have been dropped by an abandoning caller
      let _ = tx.send(result);
    });

    self.queued.fetch_add(1, Ordering::SeqCst);
    if sender.send(job).is_err() {
      self.queued.fetch_sub(1, Ordering::SeqCst);
      return Err(ExecutorError::Closed);
    }
    debug!(task = id, "task queued");

    Ok(TaskHandle { id, cancel, rx })
  }

  /// Number of units of work waiting for a free slot.
  pub fn queued(&self) -> usize {
    self.queued.load(Ordering::SeqCst)
  }

  /// Number of units of work currently running.
  pub fn running(&self) -> usize {
    self.running.load(Ordering::SeqCst)
  }

  pub fn is_stopped(&self) -> bool {
    self.stopped.load(Ordering::SeqCst)
  }

  /// Stop accepting work and wait for accepted work to finish.
  ///
  /// Work already queued still runs. A non-graceful stop also cancels every
  /// accepted unit of work. Returns once everything has finished or the
  /// shutdown timeout elapses; work still running after the timeout is left
  /// to finish on its own.
  pub async fn stop(&self, graceful: bool) -> StopStatus {
    if self.stopped.swap(true, Ordering::SeqCst) {
      return StopStatus::AlreadyStopped;
    }

    // Dropping the sender lets the dispatcher drain the queue and exit
    drop(self.queue.lock().unwrap_or_else(|e| e.into_inner()).take());

    if !graceful {
      self.shutdown.cancel();
    }
    self.tracker.close();

    info!(
      graceful,
      queued = self.queued(),
      running = self.running(),
      "task executor stopping"
    );

    match tokio::time::timeout(self.config.shutdown_timeout, self.tracker.wait()).await {
      Ok(()) => {
        info!("task executor stopped");
        StopStatus::Drained
      }
      Err(_) => {
        warn!(
          running = self.running(),
          timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
          "task executor stop timed out"
        );
        StopStatus::TimedOut
      }
    }
  }
}

async fn dispatch(
  mut rx: mpsc::UnboundedReceiver<Job>,
  permits: Arc<Semaphore>,
  tracker: TaskTracker,
  queued: Arc<AtomicUsize>,
  running: Arc<AtomicUsize>,
) {
  while let Some(job) = rx.recv().await {
    // The semaphore is never closed
    let Ok(permit) = permits.clone().acquire_owned().await else {
      break;
    };

    queued.fetch_sub(1, Ordering::SeqCst);
    running.fetch_add(1, Ordering::SeqCst);

    let running = running.clone();
    tracker.spawn_blocking(move || {
      let _permit = permit;
      job();
      running.fetch_sub(1, Ordering::SeqCst);
    });
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn config(pool_size: usize) -> ExecutorConfig {
    ExecutorConfig::default()
      .with_pool_size(pool_size)
      .with_shutdown_timeout(Duration::from_secs(5))
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_submit_returns_value() {
    let executor = TaskExecutor::start(config(2)).unwrap();
    let handle = executor.submit(|_| 21 * 2).unwrap();
    assert_eq!(handle.await, Ok(42));
    assert_eq!(executor.stop(true).await, StopStatus::Drained);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_queued_work_starts_fifo() {
    let executor = TaskExecutor::start(config(1)).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..5)
      .map(|i| {
        let order = order.clone();
        executor
          .submit(move |_| {
            order.lock().unwrap().push(i);
            std::thread::sleep(Duration::from_millis(10));
          })
          .unwrap()
      })
      .collect();

    for handle in handles {
      handle.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_pool_size_bounds_concurrency() {
    let executor = TaskExecutor::start(config(2)).unwrap();
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
      .map(|_| {
        let current = current.clone();
        let peak = peak.clone();
        executor
          .submit(move |_| {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            current.fetch_sub(1, Ordering::SeqCst);
          })
          .unwrap()
      })
      .collect();

    futures::future::join_all(handles).await;
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(executor.running(), 0);
    assert_eq!(executor.queued(), 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_graceful_stop_drains_and_rejects() {
    let executor = TaskExecutor::start(config(1)).unwrap();
    let first = executor
      .submit(|_| std::thread::sleep(Duration::from_millis(50)))
      .unwrap();
    let queued = executor.submit(|cancel| cancel.is_cancelled()).unwrap();

    assert_eq!(executor.stop(true).await, StopStatus::Drained);
    assert!(first.await.is_ok());
    // Queued work still ran, and was not cancelled
    assert_eq!(queued.await, Ok(false));

    assert_eq!(executor.submit(|_| ()).err(), Some(ExecutorError::Closed));
    assert_eq!(executor.stop(true).await, StopStatus::AlreadyStopped);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_non_graceful_stop_cancels_work() {
    let executor = TaskExecutor::start(config(1)).unwrap();
    let handle = executor
      .submit(|cancel| {
        while !cancel.is_cancelled() {
          std::thread::sleep(Duration::from_millis(5));
        }
        "acknowledged"
      })
      .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(executor.stop(false).await, StopStatus::Drained);
    assert_eq!(handle.await, Ok("acknowledged"));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_stop_times_out() {
    let executor = TaskExecutor::start(
      ExecutorConfig::default()
        .with_pool_size(1)
        .with_shutdown_timeout(Duration::from_millis(30)),
    )
    .unwrap();
    let handle = executor
      .submit(|_| std::thread::sleep(Duration::from_millis(300)))
      .unwrap();

    assert_eq!(executor.stop(true).await, StopStatus::TimedOut);
    // The abandoned work still completes on its own
    assert!(handle.await.is_ok());
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_panic_is_reported() {
    let executor = TaskExecutor::start(config(1)).unwrap();
    let handle = executor.submit(|_| -> u32 { panic!("extractor exploded") }).unwrap();

    assert_eq!(
      handle.await,
      Err(ExecutorError::Panicked {
        message: "extractor exploded".to_string()
      })
    );
    // The slot was released
    assert_eq!(executor.submit(|_| 1).unwrap().await, Ok(1));
  }

  #[tokio::test]
  async fn test_handle_cancel_reaches_work() {
    let executor = TaskExecutor::start(config(1)).unwrap();
    let handle = executor
      .submit(|cancel| {
        while !cancel.is_cancelled() {
          std::thread::sleep(Duration::from_millis(5));
        }
      })
      .unwrap();
    handle.cancel();
    assert!(handle.cancel_token().is_cancelled());
    assert!(handle.await.is_ok());
  }

  #[test]
  fn test_start_requires_runtime() {
    assert_eq!(
      TaskExecutor::start(config(1)).err(),
      Some(ExecutorError::NoRuntime)
    );
  }

  #[tokio::test]
  async fn test_zero_pool_size_rejected() {
    assert!(matches!(
      TaskExecutor::start(config(0)),
      Err(ExecutorError::InvalidConfig { .. })
    ));
  }
}
