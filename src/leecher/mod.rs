//! The leech service, split into focused submodules.
//!
//! The `Leecher` struct and its methods are organized by domain:
//! - [`transfer`] - Transfer Runner, captcha submission
//! - [`sampling`] - Sample Download Runner
//! - [`download`] - Full Download Runner and the disk space guard
//! - [`resume`] - restart / restart_downloading / resume operations
//! - [`files`] - remote and local file listing, deletion, erase and purge
//! - [`callback`] - callback notifications

mod callback;
mod download;
mod files;
mod resume;
mod sampling;
mod transfer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use callback::CallbackNotifier;
pub use files::{PurgeReport, TRASH_DIR_NAME};

use crate::config::Config;
use crate::db::{Database, NewTask, TaskFilter};
use crate::error::{Error, Result, TaskError};
use crate::remote::{RemoteClient, sanitize_message};
use crate::shared_link::SharedLink;
use crate::task::Task;
use crate::types::{CallbackAction, CallbackPayload, TaskId, TaskPage};
use regex::Regex;
use std::sync::Arc;

/// Request to create a task
#[derive(Clone, Debug, Default)]
pub struct CreateTask {
    /// Shared link, standard or `surl` form, optionally carrying `?pwd=`
    pub shared_link: String,
    /// Explicit password; wins over the link's `pwd` parameter
    pub shared_password: Option<String>,
    /// Open the full download gate right away (default from configuration)
    pub full_download_now: Option<bool>,
    /// URL notified on stage transitions
    pub callback: Option<String>,
}

/// Leech service (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Leecher {
    /// Database instance for persistence
    /// Public for integration tests to inspect task rows
    pub db: Arc<Database>,
    /// Remote storage provider
    pub(crate) remote: Arc<dyn RemoteClient>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Callback sender
    pub(crate) notifier: CallbackNotifier,
    /// Compiled `storage.ignore_path_regex`
    pub(crate) ignore: Arc<Regex>,
}

impl Leecher {
    /// Open the database at `config.persistence.database_path` and build the service
    pub async fn new(config: Config, remote: Arc<dyn RemoteClient>) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_database(Arc::new(db), remote, Arc::new(config))
    }

    /// Build the service over an already opened database
    pub fn with_database(
        db: Arc<Database>,
        remote: Arc<dyn RemoteClient>,
        config: Arc<Config>,
    ) -> Result<Self> {
        let ignore = Regex::new(&config.storage.ignore_path_regex).map_err(|e| Error::Config {
            message: format!("invalid ignore_path_regex: {}", e),
            key: Some("ignore_path_regex".to_string()),
        })?;
        let notifier = CallbackNotifier::new(config.callback.timeout)?;

        Ok(Self {
            db,
            remote,
            config,
            notifier,
            ignore: Arc::new(ignore),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a task from a shared link
    ///
    /// The link is parsed up front so a malformed link never becomes a task.
    pub async fn create_task(&self, request: CreateTask) -> Result<Task> {
        let shared =
            SharedLink::parse(&request.shared_link, request.shared_password.as_deref())?;

        let new = NewTask {
            shared_link: request.shared_link,
            shared_id: shared.shared_id,
            shared_password: shared.shared_password,
            full_download_now: request
                .full_download_now
                .unwrap_or(self.config.pipeline.full_download_immediately_default),
            callback: request.callback.filter(|url| !url.is_empty()),
        };
        let id = self.db.insert_task(&new).await?;

        tracing::info!(task_id = %id, shared_id = %new.shared_id, "task created");
        self.db.require_task(id).await
    }

    /// Load a task
    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        self.db.require_task(id).await
    }

    /// One page of tasks, newest first; `page` is 1-based
    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: i64,
        per_page: Option<i64>,
    ) -> Result<TaskPage> {
        let per_page = per_page
            .filter(|n| *n > 0)
            .unwrap_or(self.config.api.page_size);
        let page = page.max(1);

        let count = self.db.count_tasks(filter).await?;
        let tasks = self
            .db
            .list_tasks(filter, per_page, (page - 1) * per_page)
            .await?;

        Ok(TaskPage {
            count,
            page,
            per_page,
            results: tasks.iter().map(|t| t.to_info(&self.config)).collect(),
        })
    }

    /// Open or close the full download gate
    pub async fn set_full_download_now(&self, id: TaskId, enabled: bool) -> Result<Task> {
        let mut task = self.db.require_task(id).await?;
        if task.full_download_now != enabled {
            task.full_download_now = enabled;
            self.db.save_task(&task).await?;
            tracing::info!(task_id = %id, enabled, "full download gate changed");
        }
        Ok(task)
    }

    /// Close the database pool
    pub async fn shutdown(self) {
        match Arc::try_unwrap(self.db) {
            Ok(db) => db.close().await,
            Err(_) => tracing::debug!("database still shared, leaving pool to drop"),
        }
    }

    /// Fire the task's callback for `action`, if it has one
    pub(crate) fn notify(&self, task: &Task, action: CallbackAction) {
        if let Some(url) = &task.callback {
            let payload = CallbackPayload {
                action,
                task: task.to_info(&self.config),
            };
            self.notifier.notify(url.clone(), payload);
        }
    }

    /// Record a runner failure on `task` and persist it
    pub(crate) async fn fail(&self, task: &mut Task, stage: &str, error: &Error) -> Result<()> {
        let message = sanitize_message(&error.to_string());
        tracing::error!(task_id = %task.id, stage, error = %message, "runner failed");
        task.mark_failed(&message);
        self.db.save_task(task).await
    }

    /// Drop a runner claim; a failure only delays the next run until the claim times out
    pub(crate) async fn release(&self, id: TaskId) {
        if let Err(e) = self.db.release_claim(id).await {
            tracing::error!(task_id = %id, error = %e, "failed to release task claim");
        }
    }

    pub(crate) fn ignored(&self, remote_path: &str) -> bool {
        self.ignore.is_match(remote_path)
    }
}

pub(crate) fn invalid_state(task: &Task, operation: &str) -> Error {
    let current_state = if task.failed {
        format!("{} (failed)", task.status)
    } else {
        task.status.to_string()
    };
    Error::Task(TaskError::InvalidState {
        id: task.id.0,
        operation: operation.to_string(),
        current_state,
    })
}
