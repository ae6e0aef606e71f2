//! Task dispatcher and worker pool.
//!
//! [`Dispatcher::submit`] pushes a task id onto an unbounded queue and
//! returns immediately. The [`Engine`] loop pulls ids, waits for a free
//! worker slot (a semaphore permit), and spawns one Tokio task per
//! claimed job. A worker owns its task from claim to terminal state;
//! faults inside a worker are converted to task failure and never take
//! down the loop or other in-flight tasks.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use mealscan_core::types::TaskId;
use mealscan_estimator::Estimator;
use mealscan_events::ProgressBroker;
use mealscan_store::TaskStore;

use super::runner;

/// Fire-and-forget handle for enqueueing tasks.
///
/// Cheaply cloneable; held in `AppState` and used by the submit handler.
#[derive(Clone)]
pub struct Dispatcher {
    queue_tx: mpsc::UnboundedSender<TaskId>,
}

impl Dispatcher {
    /// Enqueue a task for asynchronous execution. Never blocks.
    ///
    /// If the engine has shut down the id is dropped with an error log;
    /// the record stays `pending` and the operator restarts the service.
    pub fn submit(&self, task_id: TaskId) {
        if self.queue_tx.send(task_id).is_err() {
            tracing::error!(task_id = %task_id, "Engine queue closed; task not dispatched");
        }
    }
}

/// The worker engine: owns the queue receiver and the worker pool.
pub struct Engine {
    store: Arc<TaskStore>,
    broker: Arc<ProgressBroker>,
    estimator: Arc<dyn Estimator>,
    workers: Arc<Semaphore>,
    queue_rx: mpsc::UnboundedReceiver<TaskId>,
}

impl Engine {
    /// Create an engine and its submission handle.
    ///
    /// `worker_limit` bounds how many tasks execute concurrently; queued
    /// ids wait for a free slot without blocking submitters.
    pub fn new(
        store: Arc<TaskStore>,
        broker: Arc<ProgressBroker>,
        estimator: Arc<dyn Estimator>,
        worker_limit: usize,
    ) -> (Dispatcher, Self) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let engine = Self {
            store,
            broker,
            estimator,
            workers: Arc::new(Semaphore::new(worker_limit)),
            queue_rx,
        };
        (Dispatcher { queue_tx }, engine)
    }

    /// Run the dispatch loop until the cancellation token is triggered
    /// or every `Dispatcher` handle has been dropped.
    ///
    /// Cancellation stops intake only; already-spawned workers run
    /// their task to a terminal state.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(
            worker_limit = self.workers.available_permits(),
            "Task engine started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Task engine shutting down");
                    break;
                }
                maybe_id = self.queue_rx.recv() => {
                    match maybe_id {
                        Some(task_id) => self.dispatch(task_id).await,
                        None => {
                            tracing::info!("All dispatcher handles dropped, task engine stopping");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Claim a worker slot and spawn the runner for one task.
    async fn dispatch(&self, task_id: TaskId) {
        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            // Only possible if the semaphore is closed, which we never do.
            Err(_) => return,
        };

        let store = Arc::clone(&self.store);
        let broker = Arc::clone(&self.broker);
        let estimator = Arc::clone(&self.estimator);

        tokio::spawn(async move {
            // Held for the lifetime of this worker; releasing it frees
            // the slot for the next queued task.
            let _permit = permit;

            tracing::info!(task_id = %task_id, "Worker claimed task");

            let outcome = std::panic::AssertUnwindSafe(runner::run_task(
                &store, &broker, estimator.as_ref(), task_id,
            ))
            .catch_unwind()
            .await;

            match outcome {
                Ok(Ok(())) => {
                    tracing::info!(task_id = %task_id, "Worker finished task");
                }
                Ok(Err(e)) => {
                    tracing::error!(task_id = %task_id, error = %e, "Task failed");
                    runner::fail_task(&store, &broker, task_id, &e.to_string()).await;
                }
                Err(_panic) => {
                    // Fault isolation: a panicking worker fails its own
                    // task and nothing else.
                    tracing::error!(task_id = %task_id, "Worker panicked");
                    runner::fail_task(
                        &store,
                        &broker,
                        task_id,
                        "Internal worker fault while processing the task",
                    )
                    .await;
                }
            }
        });
    }
}
