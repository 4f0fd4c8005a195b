//! Full Download Runner and the disk space guard.

use super::{Leecher, invalid_state};
use crate::error::{Error, Result};
use crate::task::Task;
use crate::types::{CallbackAction, Status, TaskId};
use crate::utils::{contained_path, existing_ancestor, get_available_space, local_file_size};
use chrono::Utc;

impl Leecher {
    /// Download every file of a gated `SampleDownloaded` task into its data directory
    ///
    /// Files whose local size already reaches the remote size are skipped; anything
    /// shorter is downloaded again from byte zero.
    ///
    /// Like sampling, the run holds a claim on the task.
    pub async fn download_files(&self, id: TaskId) -> Result<Task> {
        let task = self.db.require_task(id).await?;
        let claim_timeout = self.config.pipeline.claim_timeout;
        if !task.full_download_now
            || !self
                .db
                .claim_run(id, Status::SampleDownloaded, claim_timeout)
                .await?
        {
            return Err(invalid_state(&task, "download files"));
        }

        let outcome = self.leech_claimed(id).await;
        self.release(id).await;
        outcome
    }

    async fn leech_claimed(&self, id: TaskId) -> Result<Task> {
        let mut task = self.db.require_task(id).await?;
        if !task.full_download_now {
            return Err(invalid_state(&task, "download files"));
        }

        match self.leech_files(&task).await {
            Ok(fetched) => {
                let now = Utc::now();
                task.full_downloaded_at = Some(now);
                task.finished_at = Some(now);
                task.status = Status::Finished;
                self.db.save_task(&task).await?;
                tracing::info!(
                    task_id = %id,
                    fetched,
                    path = %task.data_path(&self.config).display(),
                    "files downloaded"
                );
                self.notify(&task, CallbackAction::FilesDownloaded);
            }
            Err(e @ (Error::Database(_) | Error::Sqlx(_))) => return Err(e),
            Err(e) => self.fail(&mut task, "download", &e).await?,
        }
        Ok(task)
    }

    async fn leech_files(&self, task: &Task) -> Result<usize> {
        let data_root = task.data_path(&self.config);

        let mut pending = Vec::new();
        for file in task.regular_files() {
            if self.ignored(&file.path) {
                tracing::debug!(task_id = %task.id, path = %file.path, "ignored by path regex");
                continue;
            }
            let Some(local_path) = contained_path(&data_root, &file.path) else {
                tracing::warn!(
                    task_id = %task.id,
                    path = %file.path,
                    "path outside task directory, skipping"
                );
                continue;
            };
            let local_size = local_file_size(&local_path);
            if local_path.is_file() && local_size >= file.size {
                tracing::debug!(task_id = %task.id, path = %file.path, "file present, skipping");
                continue;
            }
            pending.push((file, local_path, local_size));
        }

        let remaining: u64 = pending
            .iter()
            .map(|(file, _, local_size)| file.size.saturating_sub(*local_size))
            .sum();
        self.check_disk_space(task, remaining)?;

        tokio::fs::create_dir_all(&data_root).await?;
        for (file, local_path, _) in &pending {
            let local_dir = local_path.parent().unwrap_or(&data_root);
            self.remote
                .download_file(
                    &task.remote_file_path(&self.config, file),
                    local_dir,
                    file.size,
                    0,
                )
                .await?;
        }
        Ok(pending.len())
    }

    /// Fail when fewer than `required + min_free_space` bytes are free under the data root
    pub(crate) fn check_disk_space(&self, task: &Task, required: u64) -> Result<()> {
        let disk_space = &self.config.storage.disk_space;
        if !disk_space.enabled || required == 0 {
            return Ok(());
        }

        let required_with_buffer = required.saturating_add(disk_space.min_free_space);
        let check_path = existing_ancestor(&task.data_path(&self.config));
        let available = get_available_space(&check_path).map_err(|e| {
            Error::DiskSpaceCheckFailed(format!(
                "Failed to check disk space for '{}': {}",
                check_path.display(),
                e
            ))
        })?;

        if available < required_with_buffer {
            return Err(Error::InsufficientSpace {
                required: required_with_buffer,
                available,
            });
        }
        Ok(())
    }
}
