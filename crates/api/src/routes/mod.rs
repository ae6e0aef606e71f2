pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Accept multipart bodies up to 16 MB so an oversized image reaches the
/// validator and gets a JSON 400 instead of a bare 413 from the framework.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /estimate            POST   submit a meal image for estimation
/// /tasks               GET    list recent tasks (summaries)
/// /tasks/{id}          GET    poll one task's state
/// /ws/tasks/{id}       GET    WebSocket subscription to one task
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/estimate", post(handlers::tasks::submit_estimation))
        .route("/tasks", get(handlers::tasks::list_tasks))
        .route("/tasks/{id}", get(handlers::tasks::get_task))
        .route("/ws/tasks/{id}", get(ws::task_ws_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
