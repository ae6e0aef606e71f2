//! Task store: the sole source of truth for task state.
//!
//! [`TaskStore`] owns every task record and enforces the state machine
//! defined in `mealscan-core`. It is an in-process store behind a
//! `tokio::sync::RwLock`, designed to be shared via `Arc<TaskStore>`;
//! mutations are atomic under the write lock and immediately visible
//! to readers. Per-task write serialization comes from the dispatch
//! model (exactly one worker ever owns a task), not from row locks.

mod task_store;

pub use task_store::{StoreError, TaskStore};
