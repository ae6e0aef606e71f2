use std::sync::Arc;

use mealscan_events::ProgressBroker;
use mealscan_store::TaskStore;

use crate::config::ServerConfig;
use crate::engine::Dispatcher;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// The authoritative task store.
    pub store: Arc<TaskStore>,
    /// Per-task progress fan-out.
    pub broker: Arc<ProgressBroker>,
    /// Fire-and-forget handle into the worker engine queue.
    pub dispatcher: Dispatcher,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
