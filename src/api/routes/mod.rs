//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`tasks`] — Task creation, listing and pipeline operations
//! - [`files`] — Remote/local file listings, deletion, erase and purge
//! - [`system`] — Health and OpenAPI

use crate::leecher::CreateTask;
use crate::types::Status;
use serde::{Deserialize, Serialize};

mod files;
mod system;
mod tasks;

// Re-export all handlers so `routes::function_name` works
pub use files::*;
pub use system::*;
pub use tasks::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /tasks
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct TaskListQuery {
    /// Only tasks in this status
    pub status: Option<Status>,
    /// Only tasks created from exactly this link
    pub shared_link: Option<String>,
    /// Only failed (true) or healthy (false) tasks
    pub failed: Option<bool>,
    /// Page number, 1-based (default: 1)
    pub page: Option<i64>,
    /// Page size (default: `api.page_size`)
    pub per_page: Option<i64>,
}

/// Request body for POST /tasks
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    /// Shared link, e.g. `https://pan.baidu.com/s/1abc?pwd=wxyz`
    pub shared_link: String,
    /// Password, when the link does not carry `pwd`
    #[serde(default)]
    pub shared_password: Option<String>,
    /// Open the full download gate right away
    #[serde(default)]
    pub full_download_now: Option<bool>,
    /// URL notified on stage transitions
    #[serde(default)]
    pub callback: Option<String>,
}

impl From<CreateTaskRequest> for CreateTask {
    fn from(request: CreateTaskRequest) -> Self {
        CreateTask {
            shared_link: request.shared_link,
            shared_password: request.shared_password,
            full_download_now: request.full_download_now,
            callback: request.callback,
        }
    }
}

/// Request body for POST /tasks/:id/captcha_code
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CaptchaCodeRequest {
    /// Code read off the captcha image
    pub code: String,
}

/// Request body for POST /tasks/:id/full_download_now
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FullDownloadNowRequest {
    /// Open (true) or close (false) the gate (default: true)
    #[serde(default = "default_true")]
    pub full_download_now: bool,
}

/// Request body for POST /tasks/purge
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PurgeRequest {
    /// Move orphan directories into the trash instead of deleting them (default: true)
    #[serde(default = "default_true")]
    pub move_to_trash: bool,
}

/// Response for POST /tasks/purge
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct PurgeResponse {
    /// Always true once the purge ran
    pub done: bool,
    /// Directory names that were purged
    pub purged: Vec<String>,
}

fn default_true() -> bool {
    true
}
