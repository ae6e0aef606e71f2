//! Per-task publish/subscribe fan-out.
//!
//! [`ProgressBroker`] keys one broadcast group per task id. Publishing
//! delivers to every subscriber attached to that group at call time --
//! best-effort, at-most-once per subscriber, nothing queued for absent
//! subscribers. Late joiners reconcile through snapshot-on-connect at
//! the gateway, not through replay here.

use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};

use mealscan_core::types::TaskId;

use crate::event::TaskEvent;

/// Buffer capacity of each per-task broadcast channel.
///
/// A task produces a handful of checkpoints plus one terminal event, so
/// a subscriber only lags if its connection has stalled badly; lagged
/// receivers resynchronize from a store snapshot at the gateway.
const GROUP_CAPACITY: usize = 64;

/// In-process fan-out broker, one broadcast group per task id.
///
/// Designed to be shared via `Arc<ProgressBroker>`. The group map is
/// mutated concurrently by connect/disconnect and read by publish, so
/// it lives behind an internal `RwLock`.
pub struct ProgressBroker {
    groups: RwLock<HashMap<TaskId, broadcast::Sender<TaskEvent>>>,
}

impl ProgressBroker {
    /// Create a broker with no groups.
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to a task's group, creating the group on first use.
    ///
    /// Dropping the returned receiver unsubscribes; call
    /// [`prune`](Self::prune) afterwards to reclaim an emptied group.
    pub async fn subscribe(&self, task_id: TaskId) -> broadcast::Receiver<TaskEvent> {
        let mut groups = self.groups.write().await;
        groups
            .entry(task_id)
            .or_insert_with(|| broadcast::channel(GROUP_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to every subscriber currently in the group.
    ///
    /// Returns the number of subscribers the event was delivered to.
    /// A task nobody is watching has no group (or an empty one) and the
    /// event is dropped -- by design, not an error.
    pub async fn publish(&self, task_id: TaskId, event: TaskEvent) -> usize {
        let groups = self.groups.read().await;
        match groups.get(&task_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop the group for `task_id` if it has no subscribers left.
    ///
    /// Called by the gateway on disconnect so groups for finished or
    /// unwatched tasks do not accumulate.
    pub async fn prune(&self, task_id: TaskId) {
        let mut groups = self.groups.write().await;
        if let Some(sender) = groups.get(&task_id) {
            if sender.receiver_count() == 0 {
                groups.remove(&task_id);
            }
        }
    }

    /// Number of live groups (tasks with at least one past subscriber
    /// that has not been pruned).
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}

impl Default for ProgressBroker {
    fn default() -> Self {
        Self::new()
    }
}
