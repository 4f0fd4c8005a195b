//! REST API server module
//!
//! Provides an OpenAPI 3 REST API for creating leech tasks, driving them
//! through the pipeline and managing their files.

use crate::{Config, Leecher, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `GET /tasks` - List tasks (paginated, `status` / `shared_link` / `failed` filters)
/// - `POST /tasks` - Create a task from a shared link
/// - `GET /tasks/:id` - Get single task
/// - `DELETE /tasks/:id` - Delete the task row, keeping its files
/// - `POST /tasks/:id/restart` - Back to the transfer stage
/// - `POST /tasks/:id/restart_downloading` - Back to the sampling stage
/// - `POST /tasks/:id/resume` - Resume a failed task at its failed stage
/// - `POST /tasks/:id/full_download_now` - Open or close the full download gate
/// - `POST /tasks/:id/captcha_code` - Submit a captcha code
/// - `GET /tasks/:id/captcha` - Captcha image
///
/// ## Files
/// - `GET /tasks/:id/files` - Remote inventory
/// - `DELETE /tasks/:id/files` - Delete remote files
/// - `GET /tasks/:id/local_files` - Local files
/// - `DELETE /tasks/:id/local_files` - Delete local files
/// - `DELETE /tasks/:id/erase` - Delete remote files, local files and the task
/// - `POST /tasks/purge` - Remove orphan local directories
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(leecher: Leecher, config: Arc<Config>) -> Router {
    let state = AppState::new(leecher, config.clone());

    let router = Router::new()
        // Tasks
        .route("/tasks", get(routes::list_tasks))
        .route("/tasks", post(routes::create_task))
        .route("/tasks/purge", post(routes::purge))
        .route("/tasks/:id", get(routes::get_task))
        .route("/tasks/:id", delete(routes::delete_task))
        .route("/tasks/:id/restart", post(routes::restart_task))
        .route(
            "/tasks/:id/restart_downloading",
            post(routes::restart_downloading),
        )
        .route("/tasks/:id/resume", post(routes::resume_task))
        .route(
            "/tasks/:id/full_download_now",
            post(routes::full_download_now),
        )
        .route("/tasks/:id/captcha_code", post(routes::submit_captcha_code))
        .route("/tasks/:id/captcha", get(routes::get_captcha))
        // Files
        .route("/tasks/:id/files", get(routes::list_remote_files))
        .route("/tasks/:id/files", delete(routes::delete_remote_files))
        .route("/tasks/:id/local_files", get(routes::list_local_files))
        .route("/tasks/:id/local_files", delete(routes::delete_local_files))
        .route("/tasks/:id/erase", delete(routes::erase_task))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Swagger UI must be merged before the state is applied
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until `shutdown` is cancelled, then drains in-flight requests.
///
/// # Example
///
/// ```no_run
/// use baidupcs_leecher::{BaiduPcsClient, Config, Leecher};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load(None)?;
/// let remote = Arc::new(BaiduPcsClient::from_config(&config)?);
/// let leecher = Leecher::new(config.clone(), remote).await?;
///
/// baidupcs_leecher::api::start_api_server(leecher, Arc::new(config), CancellationToken::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    leecher: Leecher,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(leecher, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
