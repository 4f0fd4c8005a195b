//! Task CRUD and poller selection queries.

use crate::error::{DatabaseError, TaskError};
use crate::task::Task;
use crate::types::{Status, TaskId};
use crate::{Error, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use std::time::Duration;

use super::{Database, NewTask, TaskFilter, TaskRow};

const TASK_COLUMNS: &str = r#"
    id, shared_link, shared_id, shared_password, status, failed, message,
    retry_times, created_at, started_at, transfer_completed_at, file_listed_at,
    sample_downloaded_at, full_downloaded_at, finished_at, full_download_now,
    files, captcha_required, captcha, captcha_id, captcha_url, captcha_code,
    callback
"#;

fn query_failed(what: &str, e: sqlx::Error) -> Error {
    Error::Database(DatabaseError::QueryFailed(format!(
        "Failed to {}: {}",
        what, e
    )))
}

fn into_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>> {
    rows.into_iter().map(Task::try_from).collect()
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &TaskFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(link) = &filter.shared_link {
        builder.push(" AND shared_link = ").push_bind(link.clone());
    }
    if let Some(failed) = filter.failed {
        builder.push(" AND failed = ").push_bind(failed);
    }
}

impl Database {
    /// Insert a new task in `Inited` status
    pub async fn insert_task(&self, task: &NewTask) -> Result<TaskId> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (
                shared_link, shared_id, shared_password, status,
                full_download_now, callback, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.shared_link)
        .bind(&task.shared_id)
        .bind(&task.shared_password)
        .bind(Status::Inited)
        .bind(task.full_download_now)
        .bind(&task.callback)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("insert task", e))?;

        Ok(TaskId(result.last_insert_rowid()))
    }

    /// Get a task by ID
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get task", e))?;

        row.map(Task::try_from).transpose()
    }

    /// Get a task by ID, failing with [`TaskError::NotFound`] if it does not exist
    pub async fn require_task(&self, id: TaskId) -> Result<Task> {
        self.get_task(id)
            .await?
            .ok_or(Error::Task(TaskError::NotFound { id: id.0 }))
    }

    /// List tasks matching `filter`, newest first
    pub async fn list_tasks(&self, filter: &TaskFilter, limit: i64, offset: i64) -> Result<Vec<Task>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = builder
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed("list tasks", e))?;

        into_tasks(rows)
    }

    /// Count tasks matching `filter`
    pub async fn count_tasks(&self, filter: &TaskFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM tasks");
        push_filter(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_failed("count tasks", e))
    }

    /// Write back every mutable field of `task`
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        let files = serde_json::to_string(&task.files)?;

        let result = sqlx::query(
            r#"
            UPDATE tasks SET
                shared_link = ?, shared_id = ?, shared_password = ?,
                status = ?, failed = ?, message = ?, retry_times = ?,
                started_at = ?, transfer_completed_at = ?, file_listed_at = ?,
                sample_downloaded_at = ?, full_downloaded_at = ?, finished_at = ?,
                full_download_now = ?, files = ?, captcha_required = ?,
                captcha = ?, captcha_id = ?, captcha_url = ?, captcha_code = ?,
                callback = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.shared_link)
        .bind(&task.shared_id)
        .bind(&task.shared_password)
        .bind(task.status)
        .bind(task.failed)
        .bind(&task.message)
        .bind(task.retry_times)
        .bind(task.started_at.map(|t| t.timestamp()))
        .bind(task.transfer_completed_at.map(|t| t.timestamp()))
        .bind(task.file_listed_at.map(|t| t.timestamp()))
        .bind(task.sample_downloaded_at.map(|t| t.timestamp()))
        .bind(task.full_downloaded_at.map(|t| t.timestamp()))
        .bind(task.finished_at.map(|t| t.timestamp()))
        .bind(task.full_download_now)
        .bind(files)
        .bind(task.captcha_required)
        .bind(&task.captcha)
        .bind(&task.captcha_id)
        .bind(&task.captcha_url)
        .bind(&task.captcha_code)
        .bind(&task.callback)
        .bind(task.id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("save task", e))?;

        if result.rows_affected() == 0 {
            return Err(Error::Task(TaskError::NotFound { id: task.id.0 }));
        }
        Ok(())
    }

    /// Delete a task row, returning whether it existed
    pub async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete task", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Healthy tasks at `status`, oldest first
    pub async fn list_by_status(&self, status: Status, limit: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE status = ? AND failed = 0 ORDER BY id ASC LIMIT ?",
            TASK_COLUMNS
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list tasks by status", e))?;

        into_tasks(rows)
    }

    /// Healthy sampled tasks whose full download is permitted, oldest first
    pub async fn list_ready_for_download(&self, limit: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"SELECT {} FROM tasks
               WHERE status = ? AND full_download_now = 1 AND failed = 0
               ORDER BY id ASC LIMIT ?"#,
            TASK_COLUMNS
        ))
        .bind(Status::SampleDownloaded)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list tasks ready for download", e))?;

        into_tasks(rows)
    }

    /// Failed tasks with an id above `after`, oldest first
    ///
    /// Pass the last id of the previous page to walk every failed task.
    pub async fn list_failed(&self, after: TaskId, limit: i64) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {} FROM tasks WHERE failed = 1 AND id > ? ORDER BY id ASC LIMIT ?",
            TASK_COLUMNS
        ))
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list failed tasks", e))?;

        into_tasks(rows)
    }

    /// `<shared_id>.<shared_password>` of every task
    pub async fn all_path_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT shared_id || '.' || shared_password FROM tasks ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list task path names", e))
    }

    /// Move a healthy task from `from` to `to` if nobody else did first
    ///
    /// Returns false when the task is missing, failed, or no longer at `from`.
    pub async fn claim_task(&self, id: TaskId, from: Status, to: Status) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ? WHERE id = ? AND status = ? AND failed = 0",
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("claim task", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Mark a healthy task at `status` as being worked on
    ///
    /// Fails while another runner holds a claim younger than `timeout`. Only
    /// [`Database::release_claim`] clears the mark; saving the task leaves it alone.
    pub async fn claim_run(&self, id: TaskId, status: Status, timeout: Duration) -> Result<bool> {
        let now = Utc::now().timestamp();
        let stale_before = now - i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
        let result = sqlx::query(
            r#"UPDATE tasks SET claimed_at = ?
               WHERE id = ? AND status = ? AND failed = 0
               AND (claimed_at IS NULL OR claimed_at < ?)"#,
        )
        .bind(now)
        .bind(id)
        .bind(status)
        .bind(stale_before)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("claim task run", e))?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop the claim taken by [`Database::claim_run`]
    pub async fn release_claim(&self, id: TaskId) -> Result<()> {
        sqlx::query("UPDATE tasks SET claimed_at = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("release task claim", e))?;
        Ok(())
    }
}
