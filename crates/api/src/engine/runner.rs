//! The worker runner: one task, start to terminal state.
//!
//! Every checkpoint follows the same discipline: persist the mutation
//! in the task store first, then publish the post-mutation snapshot to
//! the progress broker. A snapshot fetched immediately after an event
//! is therefore never staler than the event itself.

use mealscan_core::types::TaskId;
use mealscan_estimator::{Estimator, EstimatorError, JobEvent};
use mealscan_events::{ProgressBroker, TaskEvent};
use mealscan_store::{StoreError, TaskStore};

/// Pre-stream checkpoints: fraction reached once the upload is on its
/// way to the service, once the job is accepted and analyzing, and once
/// the terminal result is being materialized.
const PROGRESS_SUBMITTING: f64 = 0.1;
const PROGRESS_ANALYZING: f64 = 0.3;
const PROGRESS_FORMATTING: f64 = 0.8;

/// Errors that end a task in the `failed` state.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    /// The estimation service reported job failure.
    #[error("{0}")]
    Job(String),

    /// Anything else that should never happen mid-run.
    #[error("{0}")]
    Fault(String),
}

/// Execute one task end to end.
///
/// On `Err`, the caller converts the error into the failed-state path
/// via [`fail_task`]; this function itself only ever completes a task.
pub(super) async fn run_task(
    store: &TaskStore,
    broker: &ProgressBroker,
    estimator: &dyn Estimator,
    task_id: TaskId,
) -> Result<(), WorkerError> {
    // A missing record means submission and dispatch disagree; there is
    // nothing to write, but subscribers still get a terminal event
    // (fail_task handles the NotFound write gracefully).
    //
    // Taking the image is the claim: a duplicate enqueue of an
    // already-claimed id finds it gone and must back off without
    // touching the owning worker's task.
    let upload = match store.take_image(task_id).await? {
        Some(upload) => upload,
        None => {
            tracing::warn!(task_id = %task_id, "Task already claimed, ignoring duplicate dispatch");
            return Ok(());
        }
    };

    checkpoint(
        store,
        broker,
        task_id,
        Phase::Start,
        PROGRESS_SUBMITTING,
        "Uploading image to the estimation service",
    )
    .await?;

    let handle = estimator.submit(&upload).await?;
    drop(upload);

    checkpoint(
        store,
        broker,
        task_id,
        Phase::Progress,
        PROGRESS_ANALYZING,
        "Analyzing image",
    )
    .await?;

    let mut job = estimator.watch(&handle).await?;

    loop {
        match job.next_event().await? {
            JobEvent::Progress { progress, message } => {
                checkpoint(store, broker, task_id, Phase::Progress, progress, &message).await?;
            }
            JobEvent::Completed { result } => {
                checkpoint(
                    store,
                    broker,
                    task_id,
                    Phase::Progress,
                    PROGRESS_FORMATTING,
                    "Formatting estimation results",
                )
                .await?;

                if let Some(snapshot) = store.mark_completed(task_id, result).await? {
                    broker.publish(task_id, TaskEvent::snapshot(&snapshot)).await;
                    // Downstream boundary: the structured result is now
                    // published; nutrition scoring picks it up from here.
                    tracing::info!(
                        task_id = %task_id,
                        foods = snapshot.result.as_ref().map(|r| r.foods.len()).unwrap_or(0),
                        "Estimation result ready for meal logging",
                    );
                }
                return Ok(());
            }
            JobEvent::Failed { error } => {
                return Err(WorkerError::Job(error));
            }
        }
    }
}

/// Convert any worker failure into the failed-state path:
/// `mark_failed` first, then publish the snapshot.
///
/// When the record does not exist the failure event is still published
/// so a subscriber on that group never waits in silence.
pub(super) async fn fail_task(
    store: &TaskStore,
    broker: &ProgressBroker,
    task_id: TaskId,
    error: &str,
) {
    match store.mark_failed(task_id, error).await {
        Ok(Some(snapshot)) => {
            broker.publish(task_id, TaskEvent::snapshot(&snapshot)).await;
        }
        Ok(None) => {
            // Already terminal; the no-op is deliberate and the earlier
            // terminal event stands.
            tracing::warn!(task_id = %task_id, "Failure on already-terminal task ignored");
        }
        Err(StoreError::NotFound(_)) => {
            broker
                .publish(
                    task_id,
                    TaskEvent::Failed {
                        error: error.to_string(),
                    },
                )
                .await;
        }
    }
}

enum Phase {
    /// First checkpoint: `pending -> processing`.
    Start,
    /// Subsequent checkpoint on a processing task.
    Progress,
}

/// Persist a progress checkpoint, then publish the snapshot it produced.
async fn checkpoint(
    store: &TaskStore,
    broker: &ProgressBroker,
    task_id: TaskId,
    phase: Phase,
    progress: f64,
    message: &str,
) -> Result<(), WorkerError> {
    let applied = match phase {
        Phase::Start => store.mark_processing(task_id, progress, message).await?,
        Phase::Progress => store.update_progress(task_id, progress, message).await?,
    };

    match applied {
        Some(snapshot) => {
            broker.publish(task_id, TaskEvent::snapshot(&snapshot)).await;
            Ok(())
        }
        // The single-owner rule makes a rejected checkpoint a bug, not
        // a race; surface it instead of continuing on a corrupt run.
        None => Err(WorkerError::Fault(format!(
            "Checkpoint rejected at progress {progress}"
        ))),
    }
}
