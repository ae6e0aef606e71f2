//! Task entity and the state machine governing it.
//!
//! A task moves strictly `pending -> processing -> {completed | failed}`.
//! Terminal states accept no further transitions; attempts are rejected
//! as no-ops by the store. Progress is canonically an `f64` fraction in
//! `[0.0, 1.0]` everywhere -- conversion to percentages, if a client
//! wants them, happens client-side.

use serde::{Deserialize, Serialize};

use crate::estimation::EstimationResult;
use crate::types::{TaskId, Timestamp};

/// Lifecycle status of a mass-estimation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Whether this status accepts no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Allowed edges: `Pending -> Processing`, `Processing -> Completed`,
    /// `Processing -> Failed`, and `Pending -> Failed` (a task that dies
    /// before its worker ever marked it processing still ends failed).
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Pending, TaskStatus::Failed)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A mass-estimation task record.
///
/// Owned by the `TaskStore`; mutated exclusively by the single worker
/// that claims the task. `result` is present iff `status == Completed`;
/// `error` is present iff `status == Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Completion fraction in `[0.0, 1.0]`, non-decreasing while processing.
    pub progress: f64,
    /// Human-readable status text; may be empty.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EstimationResult>,
    /// Name of the uploaded file as the client sent it.
    pub original_filename: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Create a fresh record in `Pending` at progress 0.
    pub fn new(original_filename: Option<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            status: TaskStatus::Pending,
            progress: 0.0,
            message: String::new(),
            error: None,
            result: None,
            original_filename,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Summary projection returned by the task list endpoint.
///
/// Deliberately omits `result` and `error` detail -- clients poll or
/// subscribe to an individual task for those.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,
    pub original_filename: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            status: task.status,
            progress: task.progress,
            message: task.message.clone(),
            original_filename: task.original_filename.clone(),
            created_at: task.created_at,
            completed_at: task.completed_at,
        }
    }
}
