//! Database layer for baidupcs-leecher
//!
//! Handles SQLite persistence for tasks.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`tasks`] — Task CRUD, poller selection predicates, optimistic claim

use crate::error::{Error, Result};
use crate::task::Task;
use crate::types::{RemoteFile, Status, TaskId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod tasks;

/// New task to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Raw shared link as submitted
    pub shared_link: String,
    /// Share id parsed from the link
    pub shared_id: String,
    /// Share password, empty for public shares
    pub shared_password: String,
    /// Initial value of the full download gate
    pub full_download_now: bool,
    /// URL notified on stage transitions
    pub callback: Option<String>,
}

/// Filter for task listings
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Only tasks with this status
    pub status: Option<Status>,
    /// Only tasks created from exactly this link
    pub shared_link: Option<String>,
    /// Only failed (`Some(true)`) or healthy (`Some(false)`) tasks
    pub failed: Option<bool>,
}

/// Task record from database (raw from SQLite)
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    /// Unique database ID
    pub id: TaskId,
    /// Raw shared link
    pub shared_link: String,
    /// Share id
    pub shared_id: String,
    /// Share password
    pub shared_password: String,
    /// Pipeline status
    pub status: Status,
    /// Failure flag
    pub failed: bool,
    /// Last failure message
    pub message: String,
    /// Number of restarts
    pub retry_times: i64,
    /// Unix timestamp of creation
    pub created_at: i64,
    /// Unix timestamp of transfer start
    pub started_at: Option<i64>,
    /// Unix timestamp of transfer completion
    pub transfer_completed_at: Option<i64>,
    /// Unix timestamp of the remote listing
    pub file_listed_at: Option<i64>,
    /// Unix timestamp of sample completion
    pub sample_downloaded_at: Option<i64>,
    /// Unix timestamp of full download completion
    pub full_downloaded_at: Option<i64>,
    /// Unix timestamp of reaching `Finished`
    pub finished_at: Option<i64>,
    /// Full download gate
    pub full_download_now: bool,
    /// Remote inventory as JSON
    pub files: String,
    /// Waiting for a captcha code
    pub captcha_required: bool,
    /// Captcha image
    pub captcha: Vec<u8>,
    /// Provider captcha id
    pub captcha_id: String,
    /// Captcha image URL
    pub captcha_url: String,
    /// Submitted captcha code
    pub captcha_code: String,
    /// Callback URL
    pub callback: Option<String>,
}

fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        let files: Vec<RemoteFile> = if row.files.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&row.files)?
        };

        Ok(Task {
            id: row.id,
            shared_link: row.shared_link,
            shared_id: row.shared_id,
            shared_password: row.shared_password,
            status: row.status,
            failed: row.failed,
            message: row.message,
            retry_times: row.retry_times,
            created_at: from_timestamp(row.created_at),
            started_at: row.started_at.map(from_timestamp),
            transfer_completed_at: row.transfer_completed_at.map(from_timestamp),
            file_listed_at: row.file_listed_at.map(from_timestamp),
            sample_downloaded_at: row.sample_downloaded_at.map(from_timestamp),
            full_downloaded_at: row.full_downloaded_at.map(from_timestamp),
            finished_at: row.finished_at.map(from_timestamp),
            full_download_now: row.full_download_now,
            files,
            captcha_required: row.captcha_required,
            captcha: row.captcha,
            captcha_id: row.captcha_id,
            captcha_url: row.captcha_url,
            captcha_code: row.captcha_code,
            callback: row.callback,
        })
    }
}

/// Database handle for baidupcs-leecher
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
