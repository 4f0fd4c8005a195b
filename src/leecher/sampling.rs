//! Sample Download Runner.

use super::{Leecher, invalid_state};
use crate::error::{Error, Result};
use crate::task::Task;
use crate::types::{CallbackAction, Status, TaskId};
use crate::utils::{contained_path, local_file_size};
use chrono::Utc;

impl Leecher {
    /// Download the first `sample_byte_limit` bytes of every file of a `Transferred` task
    ///
    /// Samples that already reach `min(limit, size)` bytes are kept, so a re-run only
    /// fetches what is missing.
    ///
    /// The task is claimed for the duration of the run, so a second sampling poller
    /// skips it.
    pub async fn download_samples(&self, id: TaskId) -> Result<Task> {
        let claim_timeout = self.config.pipeline.claim_timeout;
        if !self.db.claim_run(id, Status::Transferred, claim_timeout).await? {
            let task = self.db.require_task(id).await?;
            return Err(invalid_state(&task, "download samples"));
        }

        let outcome = self.sample_claimed(id).await;
        self.release(id).await;
        outcome
    }

    async fn sample_claimed(&self, id: TaskId) -> Result<Task> {
        let mut task = self.db.require_task(id).await?;

        match self.sample_files(&task).await {
            Ok(fetched) => {
                task.sample_downloaded_at = Some(Utc::now());
                task.status = Status::SampleDownloaded;
                self.db.save_task(&task).await?;
                tracing::info!(task_id = %id, fetched, "samples downloaded");
                self.notify(&task, CallbackAction::SamplingDownloaded);
            }
            Err(e @ (Error::Database(_) | Error::Sqlx(_))) => return Err(e),
            Err(e) => self.fail(&mut task, "sampling", &e).await?,
        }
        Ok(task)
    }

    async fn sample_files(&self, task: &Task) -> Result<usize> {
        let limit = self.config.storage.sample_byte_limit;
        let sample_root = task.sample_path(&self.config);
        tokio::fs::create_dir_all(&sample_root).await?;

        let mut fetched = 0;
        for file in task.regular_files() {
            if self.ignored(&file.path) {
                tracing::debug!(task_id = %task.id, path = %file.path, "ignored by path regex");
                continue;
            }

            let Some(local_path) = contained_path(&sample_root, &file.path) else {
                tracing::warn!(
                    task_id = %task.id,
                    path = %file.path,
                    "path outside task directory, skipping"
                );
                continue;
            };
            let target = if limit > 0 { limit.min(file.size) } else { file.size };
            if local_path.is_file() && local_file_size(&local_path) >= target {
                tracing::debug!(task_id = %task.id, path = %file.path, "sample present, skipping");
                continue;
            }

            let local_dir = local_path.parent().unwrap_or(&sample_root);
            self.remote
                .download_file(
                    &task.remote_file_path(&self.config, file),
                    local_dir,
                    file.size,
                    limit,
                )
                .await?;
            fetched += 1;
        }
        Ok(fetched)
    }
}
