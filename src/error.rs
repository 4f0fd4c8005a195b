//! Error types for baidupcs-leecher
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Database, Task, Remote)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::CaptchaChallenge;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for baidupcs-leecher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for baidupcs-leecher
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ignore_path_regex")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Task-related error
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// The remote storage provider failed
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// The provider demands a human-solved captcha before it accepts the shared link
    #[error("captcha required (captcha_id: {})", .0.captcha_id)]
    CaptchaRequired(CaptchaChallenge),

    /// The shared link could not be parsed
    #[error("invalid shared link: {0}")]
    InvalidSharedLink(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Network error (callbacks)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Insufficient disk space
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the operation
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Task-related errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task not found in the database
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: i64,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID that is in an invalid state for the operation
        id: i64,
        /// The operation that was attempted (e.g., "submit captcha code")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },
}

/// Errors raised by the remote storage provider adapter
///
/// The `Display` output of these variants ends up in `Task::message` and is what the
/// recoverability classifier matches on, so the wording is load-bearing.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The provider answered with a non-zero error code
    #[error("error_code: {code}, message: {message}")]
    Provider {
        /// Provider error code (`errno` / `error_code`)
        code: i64,
        /// Sanitized provider message
        message: String,
    },

    /// The HTTP request to the provider failed before a response was decoded
    #[error("BaiduPCS._request failed: {0}")]
    Request(String),

    /// The provider answered with something we could not interpret
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Provider error code, if this is a provider-side error
    pub fn code(&self) -> Option<i64> {
        match self {
            RemoteError::Provider { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl Error {
    /// Provider error code carried by this error, if any
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Error::Remote(e) => e.code(),
            _ => None,
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task error: task 123 not found",
///     "details": {
///       "task_id": 123
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidSharedLink(_) => 400,

            // 404 Not Found
            Error::NotFound(_) => 404,
            Error::Database(DatabaseError::NotFound(_)) => 404,
            Error::Task(TaskError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Task(TaskError::InvalidState { .. }) => 409,
            Error::CaptchaRequired(_) => 409,

            // 422 Unprocessable Entity
            Error::InsufficientSpace { .. } => 422,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::DiskSpaceCheckFailed(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Remote(_) => 502,
            Error::Network(_) => 502,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(DatabaseError::NotFound(_)) => "not_found",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::InvalidState { .. } => "invalid_state",
            },
            Error::Remote(_) => "remote_error",
            Error::CaptchaRequired(_) => "captcha_required",
            Error::InvalidSharedLink(_) => "invalid_shared_link",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::InsufficientSpace { .. } => "insufficient_space",
            Error::DiskSpaceCheckFailed(_) => "disk_space_check_failed",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "task_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::Remote(RemoteError::Provider { code, .. }) => Some(serde_json::json!({
                "provider_error_code": code,
            })),
            Error::CaptchaRequired(challenge) => Some(serde_json::json!({
                "captcha_id": challenge.captcha_id,
                "captcha_url": challenge.captcha_url,
            })),
            Error::InsufficientSpace {
                required,
                available,
            } => Some(serde_json::json!({
                "required_bytes": required,
                "available_bytes": available,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
