//! Mass-estimation task endpoints: submit, poll, list.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use mealscan_core::task::{Task, TaskStatus, TaskSummary};
use mealscan_core::types::TaskId;
use mealscan_core::upload::{validate_upload, ImageUpload};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Default and maximum page size for task listing.
const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: TaskId,
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// POST /api/v1/estimate
///
/// Accept a meal image as multipart form data (field `image`, `file`
/// also accepted), validate it, create a pending task, and enqueue it.
/// Returns 201 with the task id immediately; estimation runs in the
/// background.
pub async fn submit_estimation(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmitResponse>>)> {
    let mut upload: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "file" => {
                let filename = field.file_name().map(|s| s.to_string());
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                upload = Some(ImageUpload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {} // ignore unknown fields
        }
    }

    let upload = upload
        .ok_or_else(|| AppError::BadRequest("Missing multipart field 'image'".to_string()))?;

    // Rejected uploads never get a task record.
    validate_upload(&upload)?;

    let task = state.store.create(upload).await;
    state.dispatcher.submit(task.id);

    tracing::info!(
        task_id = %task.id,
        filename = task.original_filename.as_deref().unwrap_or("<unnamed>"),
        "Estimation task submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmitResponse {
                task_id: task.id,
                status: task.status,
            },
        }),
    ))
}

/// GET /api/v1/tasks/{id}
///
/// Poll one task's full current state.
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<TaskId>,
) -> AppResult<Json<DataResponse<Task>>> {
    let task = state.store.get(task_id).await?;
    Ok(Json(DataResponse { data: task }))
}

/// GET /api/v1/tasks?limit=N
///
/// List recent tasks, newest first, as summaries (no result payloads).
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<DataResponse<Vec<TaskSummary>>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    let tasks = state.store.list_recent(limit).await;
    Ok(Json(DataResponse { data: tasks }))
}
