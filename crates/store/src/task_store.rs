use std::collections::HashMap;

use tokio::sync::RwLock;

use mealscan_core::estimation::EstimationResult;
use mealscan_core::task::{Task, TaskStatus, TaskSummary};
use mealscan_core::types::TaskId;
use mealscan_core::upload::ImageUpload;

/// Errors from the task store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record exists for the given id. The store never constructs a
    /// placeholder for an unknown id.
    #[error("Task not found: {0}")]
    NotFound(TaskId),
}

/// One stored task plus the pending upload its worker will submit.
struct TaskRecord {
    task: Task,
    /// Present from creation until the owning worker takes it.
    image: Option<ImageUpload>,
}

struct Inner {
    tasks: HashMap<TaskId, TaskRecord>,
    /// Insertion order, oldest first. Backs newest-first listing.
    order: Vec<TaskId>,
}

/// The authoritative store of task records.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the API handlers, the worker engine, and the
/// notification gateway.
///
/// Every mutation method returns `Ok(Some(snapshot))` with the exact
/// post-mutation state when the transition was applied, or `Ok(None)`
/// when the state machine rejected it (already terminal, or wrong
/// phase). Rejected transitions leave the record untouched.
pub struct TaskStore {
    inner: RwLock<Inner>,
}

impl TaskStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                tasks: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Create a task record in `Pending` at progress 0, holding the
    /// validated upload for the worker that will claim it.
    pub async fn create(&self, upload: ImageUpload) -> Task {
        let task = Task::new(upload.filename.clone());
        let snapshot = task.clone();

        let mut inner = self.inner.write().await;
        inner.order.push(task.id);
        inner.tasks.insert(
            task.id,
            TaskRecord {
                task,
                image: Some(upload),
            },
        );

        snapshot
    }

    /// Take the pending upload out of a record.
    ///
    /// Exclusively-owned handoff: the image is removed so the bytes are
    /// freed once the worker has submitted them. Returns `Ok(None)` if
    /// the upload was already taken.
    pub async fn take_image(&self, id: TaskId) -> Result<Option<ImageUpload>, StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        Ok(record.image.take())
    }

    /// Transition `Pending -> Processing` and set the initial progress
    /// checkpoint.
    pub async fn mark_processing(
        &self,
        id: TaskId,
        progress: f64,
        message: &str,
    ) -> Result<Option<Task>, StoreError> {
        self.mutate(id, |task| {
            if !task.status.can_transition_to(TaskStatus::Processing) {
                return false;
            }
            task.status = TaskStatus::Processing;
            task.progress = progress.clamp(0.0, 1.0);
            task.message = message.to_string();
            true
        })
        .await
    }

    /// Record a progress checkpoint on a processing task.
    ///
    /// Progress is clamped into `[0.0, 1.0]` and never decreases; a
    /// stale lower value keeps the previous fraction but still updates
    /// the message. Rejected outside `Processing`.
    pub async fn update_progress(
        &self,
        id: TaskId,
        progress: f64,
        message: &str,
    ) -> Result<Option<Task>, StoreError> {
        self.mutate(id, |task| {
            if task.status != TaskStatus::Processing {
                return false;
            }
            task.progress = progress.clamp(task.progress, 1.0);
            task.message = message.to_string();
            true
        })
        .await
    }

    /// Transition `Processing -> Completed`, freeze progress at 1.0,
    /// and attach the structured result.
    pub async fn mark_completed(
        &self,
        id: TaskId,
        result: EstimationResult,
    ) -> Result<Option<Task>, StoreError> {
        self.mutate(id, |task| {
            if !task.status.can_transition_to(TaskStatus::Completed) {
                return false;
            }
            task.status = TaskStatus::Completed;
            task.progress = 1.0;
            task.message = "Estimation complete".to_string();
            task.result = Some(result);
            task.completed_at = Some(chrono::Utc::now());
            true
        })
        .await
    }

    /// Transition to `Failed` with the given error text.
    ///
    /// Progress retains its last-known value -- a client reconnecting to
    /// a failed task sees how far it got.
    pub async fn mark_failed(&self, id: TaskId, error: &str) -> Result<Option<Task>, StoreError> {
        self.mutate(id, |task| {
            if !task.status.can_transition_to(TaskStatus::Failed) {
                return false;
            }
            task.status = TaskStatus::Failed;
            task.error = Some(error.to_string());
            task.completed_at = Some(chrono::Utc::now());
            true
        })
        .await
    }

    /// Fetch a snapshot of a task.
    pub async fn get(&self, id: TaskId) -> Result<Task, StoreError> {
        let inner = self.inner.read().await;
        inner
            .tasks
            .get(&id)
            .map(|r| r.task.clone())
            .ok_or(StoreError::NotFound(id))
    }

    /// List the most recent tasks, newest first, as summaries.
    pub async fn list_recent(&self, limit: usize) -> Vec<TaskSummary> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| inner.tasks.get(id))
            .map(|r| TaskSummary::from(&r.task))
            .collect()
    }

    /// Number of stored tasks.
    pub async fn count(&self) -> usize {
        self.inner.read().await.tasks.len()
    }

    /// Apply `f` to a record under the write lock.
    ///
    /// `f` returns whether it applied the mutation; the snapshot is only
    /// taken (and `updated_at` only bumped) when it did.
    async fn mutate<F>(&self, id: TaskId, f: F) -> Result<Option<Task>, StoreError>
    where
        F: FnOnce(&mut Task) -> bool,
    {
        let mut inner = self.inner.write().await;
        let record = inner.tasks.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !f(&mut record.task) {
            return Ok(None);
        }

        record.task.updated_at = chrono::Utc::now();
        Ok(Some(record.task.clone()))
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
