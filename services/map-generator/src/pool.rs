//! Worker Pool: runs a batch of render tasks on at most P blocking workers.
//!
//! Each task runs on tokio's blocking pool while holding one permit of a
//! semaphore owned by the pool, so the limit holds across batches. Results
//! arrive on an unordered channel, one per submitted task,
//! whatever happens to the task: a render failure, a panic and a timeout
//! all become failure results.

use std::sync::Arc;
use std::time::Duration;

use forecast_common::{RenderTask, TaskResult};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::render::Renderer;

/// Fixed-size pool of render workers.
#[derive(Clone)]
pub struct WorkerPool {
    workers: usize,
    semaphore: Arc<Semaphore>,
    task_timeout: Option<Duration>,
    renderer: Arc<dyn Renderer>,
}

/// Unordered completion stream for one submitted batch.
pub struct ResultStream {
    submitted: usize,
    receiver: mpsc::UnboundedReceiver<TaskResult>,
}

impl ResultStream {
    /// Number of tasks in the batch; exactly this many results will arrive.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Next completed result, `None` once every worker is done.
    pub async fn next(&mut self) -> Option<TaskResult> {
        self.receiver.recv().await
    }
}

impl WorkerPool {
    pub fn new(workers: usize, renderer: Arc<dyn Renderer>) -> Self {
        let workers = workers.max(1);
        Self {
            workers,
            semaphore: Arc::new(Semaphore::new(workers)),
            task_timeout: None,
            renderer,
        }
    }

    /// Convert a task still running after `timeout` into a failure result.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Submit the whole batch. Returns immediately; drain the stream to wait.
    pub fn submit(&self, tasks: Vec<RenderTask>) -> ResultStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let submitted = tasks.len();
        let semaphore = self.semaphore.clone();
        let renderer = self.renderer.clone();
        let timeout = self.task_timeout;

        debug!(tasks = submitted, workers = self.workers, "Submitting batch");

        tokio::spawn(async move {
            for task in tasks {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        let _ = sender.send(TaskResult::failure(&task.filename, e.to_string()));
                        continue;
                    }
                };
                let renderer = renderer.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let result = run_task(task, permit, renderer, timeout).await;
                    let _ = sender.send(result);
                });
            }
        });

        ResultStream {
            submitted,
            receiver,
        }
    }
}

/// Run one task on the blocking pool. The permit moves into the blocking
/// closure, so a timed-out task keeps its slot until it really returns.
async fn run_task(
    task: RenderTask,
    permit: OwnedSemaphorePermit,
    renderer: Arc<dyn Renderer>,
    timeout: Option<Duration>,
) -> TaskResult {
    let filename = task.filename.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        renderer.render(&task)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    filename = %filename,
                    timeout_secs = limit.as_secs_f64(),
                    "Render task timed out"
                );
                return TaskResult::failure(
                    filename,
                    format!("timed out after {:.1}s", limit.as_secs_f64()),
                );
            }
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => TaskResult::failure(filename, "render worker panicked"),
        Err(e) => TaskResult::failure(filename, format!("render worker failed: {}", e)),
    }
}
