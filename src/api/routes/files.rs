//! File handlers: listings, deletion, erase and purge.

use super::{PurgeRequest, PurgeResponse};
use crate::api::AppState;
use crate::error::Result;
use crate::types::{LocalFile, RemoteFile, TaskId};
use axum::{
    Json,
    extract::{Path, State},
};
use std::collections::BTreeMap;

/// `{"<id>": "<what happened>"}`, the body of the file deletion endpoints
fn done_message(id: i64, message: &str) -> Json<BTreeMap<String, String>> {
    Json(BTreeMap::from([(id.to_string(), message.to_string())]))
}

/// GET /tasks/:id/files - Remote inventory of the task
#[utoipa::path(
    get,
    path = "/tasks/{id}/files",
    tag = "files",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Remote files, paths relative to the task directory", body = Vec<RemoteFile>),
        (status = 404, description = "Task not found")
    )
)]
pub async fn list_remote_files(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<RemoteFile>>> {
    Ok(Json(state.leecher.remote_files(TaskId(id)).await?))
}

/// DELETE /tasks/:id/files - Delete the task's remote directory
#[utoipa::path(
    delete,
    path = "/tasks/{id}/files",
    tag = "files",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Remote files deleted"),
        (status = 404, description = "Task not found"),
        (status = 502, description = "Provider error")
    )
)]
pub async fn delete_remote_files(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BTreeMap<String, String>>> {
    state.leecher.delete_remote_files(TaskId(id)).await?;
    Ok(done_message(id, "remote files deleted"))
}

/// GET /tasks/:id/local_files - Files in the task's local data directory
#[utoipa::path(
    get,
    path = "/tasks/{id}/local_files",
    tag = "files",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Local files", body = Vec<LocalFile>),
        (status = 404, description = "Task not found")
    )
)]
pub async fn list_local_files(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LocalFile>>> {
    Ok(Json(state.leecher.local_files(TaskId(id)).await?))
}

/// DELETE /tasks/:id/local_files - Delete the task's data and sample directories
#[utoipa::path(
    delete,
    path = "/tasks/{id}/local_files",
    tag = "files",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Local files deleted"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_local_files(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BTreeMap<String, String>>> {
    state.leecher.delete_local_files(TaskId(id)).await?;
    Ok(done_message(id, "local files deleted"))
}

/// DELETE /tasks/:id/erase - Delete remote files, local files and the task
#[utoipa::path(
    delete,
    path = "/tasks/{id}/erase",
    tag = "files",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task erased"),
        (status = 404, description = "Task not found"),
        (status = 502, description = "Provider error, task kept")
    )
)]
pub async fn erase_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BTreeMap<String, String>>> {
    state.leecher.erase(TaskId(id)).await?;
    Ok(done_message(id, "task deleted"))
}

/// POST /tasks/purge - Remove local directories that belong to no task
#[utoipa::path(
    post,
    path = "/tasks/purge",
    tag = "files",
    request_body(content = PurgeRequest, description = "Omit to move orphans into the trash"),
    responses(
        (status = 200, description = "Purge finished", body = PurgeResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn purge(
    State(state): State<AppState>,
    body: Option<Json<PurgeRequest>>,
) -> Result<Json<PurgeResponse>> {
    let move_to_trash = body.map(|Json(b)| b.move_to_trash).unwrap_or(true);
    let report = state.leecher.purge(move_to_trash).await?;
    Ok(Json(PurgeResponse {
        done: true,
        purged: report.purged,
    }))
}
