//! Task event wire shapes.
//!
//! Every message a subscriber receives -- live or synthesized from a
//! snapshot -- is one of the three [`TaskEvent`] variants. Serialized
//! with an external `type` tag and a `data` payload, e.g.:
//!
//! ```json
//! {"type":"update","data":{"status":"processing","progress":0.3,"message":"Analyzing image"}}
//! ```

use serde::{Deserialize, Serialize};

use mealscan_core::estimation::EstimationResult;
use mealscan_core::task::{Task, TaskStatus};

/// A progress event on one task's group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Non-terminal progress checkpoint.
    Update {
        status: TaskStatus,
        progress: f64,
        message: String,
    },

    /// The task finished with a structured result.
    Completed { result: EstimationResult },

    /// The task ended in failure.
    Failed { error: String },
}

impl TaskEvent {
    /// Synthesize the event a subscriber would have seen had it been
    /// connected when the task reached its current state.
    ///
    /// This is what guarantees a connection opened after completion
    /// still learns the final outcome: the snapshot uses exactly the
    /// same three shapes as live publishing.
    pub fn snapshot(task: &Task) -> Self {
        match task.status {
            TaskStatus::Completed => TaskEvent::Completed {
                // `result` is present on every completed record by
                // store invariant; fall back to an empty result rather
                // than panic if it ever is not.
                result: task.result.clone().unwrap_or(EstimationResult {
                    foods: Vec::new(),
                    total_mass_g: 0.0,
                }),
            },
            TaskStatus::Failed => TaskEvent::Failed {
                error: task.error.clone().unwrap_or_default(),
            },
            TaskStatus::Pending | TaskStatus::Processing => TaskEvent::Update {
                status: task.status,
                progress: task.progress,
                message: task.message.clone(),
            },
        }
    }

    /// Whether this event ends the task's stream (completed or failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskEvent::Completed { .. } | TaskEvent::Failed { .. })
    }
}
