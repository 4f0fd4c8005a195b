//! Task handlers: creation, listing and pipeline operations.

use super::{CaptchaCodeRequest, CreateTaskRequest, FullDownloadNowRequest, TaskListQuery};
use crate::api::AppState;
use crate::db::TaskFilter;
use crate::error::Result;
use crate::types::{TaskId, TaskInfo, TaskPage};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};

/// GET /tasks - List tasks, newest first
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "tasks",
    params(
        ("status" = Option<crate::types::Status>, Query, description = "Filter by status"),
        ("shared_link" = Option<String>, Query, description = "Filter by exact shared link"),
        ("failed" = Option<bool>, Query, description = "Filter by failure flag"),
        ("page" = Option<i64>, Query, description = "Page number, 1-based"),
        ("per_page" = Option<i64>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "One page of tasks", body = TaskPage),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<TaskPage>> {
    let filter = TaskFilter {
        status: query.status,
        shared_link: query.shared_link,
        failed: query.failed,
    };
    let page = state
        .leecher
        .list_tasks(&filter, query.page.unwrap_or(1), query.per_page)
        .await?;
    Ok(Json(page))
}

/// POST /tasks - Create a task from a shared link
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskInfo),
        (status = 400, description = "Invalid shared link"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse> {
    let task = state.leecher.create_task(request.into()).await?;
    Ok((StatusCode::CREATED, Json(task.to_info(&state.config))))
}

/// GET /tasks/:id - Get a single task
#[utoipa::path(
    get,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = TaskInfo),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskInfo>> {
    let task = state.leecher.get_task(TaskId(id)).await?;
    Ok(Json(task.to_info(&state.config)))
}

/// DELETE /tasks/:id - Delete the task row, keeping its files
#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.leecher.delete_task(TaskId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/:id/restart - Send the task back to the transfer stage
#[utoipa::path(
    post,
    path = "/tasks/{id}/restart",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task restarted", body = TaskInfo),
        (status = 404, description = "Task not found")
    )
)]
pub async fn restart_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskInfo>> {
    let task = state.leecher.restart(TaskId(id)).await?;
    Ok(Json(task.to_info(&state.config)))
}

/// POST /tasks/:id/restart_downloading - Send the task back to sampling
#[utoipa::path(
    post,
    path = "/tasks/{id}/restart_downloading",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task restarted from sampling", body = TaskInfo),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Remote files were never listed")
    )
)]
pub async fn restart_downloading(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskInfo>> {
    let task = state.leecher.restart_downloading(TaskId(id)).await?;
    Ok(Json(task.to_info(&state.config)))
}

/// POST /tasks/:id/resume - Resume a failed task at its failed stage
#[utoipa::path(
    post,
    path = "/tasks/{id}/resume",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task after resume (unchanged when it had not failed)", body = TaskInfo),
        (status = 404, description = "Task not found")
    )
)]
pub async fn resume_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TaskInfo>> {
    let (task, plan) = state.leecher.resume(TaskId(id)).await?;
    tracing::debug!(task_id = id, ?plan, "resume requested");
    Ok(Json(task.to_info(&state.config)))
}

/// POST /tasks/:id/full_download_now - Open or close the full download gate
#[utoipa::path(
    post,
    path = "/tasks/{id}/full_download_now",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    request_body(content = FullDownloadNowRequest, description = "Omit to open the gate"),
    responses(
        (status = 200, description = "Gate updated", body = TaskInfo),
        (status = 404, description = "Task not found")
    )
)]
pub async fn full_download_now(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<FullDownloadNowRequest>>,
) -> Result<Json<TaskInfo>> {
    let enabled = body.map(|Json(b)| b.full_download_now).unwrap_or(true);
    let task = state
        .leecher
        .set_full_download_now(TaskId(id), enabled)
        .await?;
    Ok(Json(task.to_info(&state.config)))
}

/// POST /tasks/:id/captcha_code - Submit the captcha code and retry the transfer
#[utoipa::path(
    post,
    path = "/tasks/{id}/captcha_code",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = CaptchaCodeRequest,
    responses(
        (status = 200, description = "Transfer re-run with the code", body = TaskInfo),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Task is not waiting for a captcha code")
    )
)]
pub async fn submit_captcha_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CaptchaCodeRequest>,
) -> Result<Json<TaskInfo>> {
    let task = state
        .leecher
        .submit_captcha_code(TaskId(id), &request.code)
        .await?;
    Ok(Json(task.to_info(&state.config)))
}

/// GET /tasks/:id/captcha - Captcha image awaiting a code
#[utoipa::path(
    get,
    path = "/tasks/{id}/captcha",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Captcha image", content_type = "image/jpeg"),
        (status = 404, description = "Task not found or no captcha stored")
    )
)]
pub async fn get_captcha(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let image = state.leecher.captcha_image(TaskId(id)).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], image))
}
