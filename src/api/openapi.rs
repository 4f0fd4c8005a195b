//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the baidupcs-leecher REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the baidupcs-leecher REST API
///
/// The document can be served at:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "baidupcs-leecher REST API",
        version = "0.3.1",
        description = "REST API for leeching Baidu Pan shared links: create tasks, follow them through transfer, sampling and full download, and manage their files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local server")
    ),
    paths(
        // Tasks
        crate::api::routes::list_tasks,
        crate::api::routes::create_task,
        crate::api::routes::get_task,
        crate::api::routes::delete_task,
        crate::api::routes::restart_task,
        crate::api::routes::restart_downloading,
        crate::api::routes::resume_task,
        crate::api::routes::full_download_now,
        crate::api::routes::submit_captcha_code,
        crate::api::routes::get_captcha,

        // Files
        crate::api::routes::list_remote_files,
        crate::api::routes::delete_remote_files,
        crate::api::routes::list_local_files,
        crate::api::routes::delete_local_files,
        crate::api::routes::erase_task,
        crate::api::routes::purge,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::TaskId,
        crate::types::Status,
        crate::types::Stage,
        crate::types::StageState,
        crate::types::ResumeAction,
        crate::types::RemoteFile,
        crate::types::LocalFile,
        crate::types::CallbackAction,
        crate::types::CallbackPayload,
        crate::types::TaskInfo,
        crate::types::TaskPage,

        // API request/response types from routes
        crate::api::routes::TaskListQuery,
        crate::api::routes::CreateTaskRequest,
        crate::api::routes::CaptchaCodeRequest,
        crate::api::routes::FullDownloadNowRequest,
        crate::api::routes::PurgeRequest,
        crate::api::routes::PurgeResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "tasks", description = "Tasks - Create leech tasks and drive them through the pipeline"),
        (name = "files", description = "Files - Remote and local file listings, deletion and purge"),
        (name = "system", description = "System endpoints - Health check and OpenAPI spec"),
    )
)]
pub struct ApiDoc;
