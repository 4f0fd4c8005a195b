//! Transfer Runner and captcha submission.

use super::{Leecher, invalid_state};
use crate::error::{Error, Result};
use crate::remote::CaptchaAnswer;
use crate::task::Task;
use crate::types::{CallbackAction, Status, TaskId, TransferPolicy};
use chrono::Utc;

impl Leecher {
    /// Run the transfer stage of an `Inited` task
    ///
    /// The task is claimed with a compare-and-swap on its status, so two transfer
    /// pollers never both start it. Failures are recorded on the task, not returned;
    /// `Err` means the task could not be loaded or saved.
    pub async fn transfer(&self, id: TaskId) -> Result<Task> {
        if !self.db.claim_task(id, Status::Inited, Status::Started).await? {
            let task = self.db.require_task(id).await?;
            return Err(invalid_state(&task, "transfer"));
        }

        let mut task = self.db.require_task(id).await?;
        task.started_at = Some(Utc::now());
        self.db.save_task(&task).await?;
        tracing::info!(task_id = %id, link = %task.shared_link, "transfer started");

        self.run_transfer(task, None).await
    }

    /// Submit the code of a pending captcha and re-run the transfer once
    pub async fn submit_captcha_code(&self, id: TaskId, code: &str) -> Result<Task> {
        let mut task = self.db.require_task(id).await?;
        if !task.captcha_required || task.status != Status::Started || task.failed {
            return Err(invalid_state(&task, "submit captcha code"));
        }

        task.captcha_code = code.trim().to_string();
        task.captcha_required = false;
        self.db.save_task(&task).await?;

        let answer = CaptchaAnswer {
            captcha_id: task.captcha_id.clone(),
            code: task.captcha_code.clone(),
        };
        tracing::info!(task_id = %id, "captcha code submitted, retrying transfer");
        self.run_transfer(task, Some(answer)).await
    }

    /// Image of the pending captcha
    pub async fn captcha_image(&self, id: TaskId) -> Result<Vec<u8>> {
        let task = self.db.require_task(id).await?;
        if task.captcha.is_empty() {
            return Err(Error::NotFound(format!("captcha of task {}", id)));
        }
        Ok(task.captcha)
    }

    async fn run_transfer(&self, mut task: Task, captcha: Option<CaptchaAnswer>) -> Result<Task> {
        match self.save_and_list(&mut task, captcha.as_ref()).await {
            Ok(()) => {}
            Err(Error::CaptchaRequired(challenge)) => {
                task.captcha_required = true;
                task.captcha_id = challenge.captcha_id;
                task.captcha_url = challenge.captcha_url;
                task.captcha = challenge.image;
                task.captcha_code.clear();
                self.db.save_task(&task).await?;
                tracing::info!(task_id = %task.id, "transfer waiting for captcha code");
                self.notify(&task, CallbackAction::CaptchaRequired);
            }
            Err(e @ (Error::Database(_) | Error::Sqlx(_))) => return Err(e),
            Err(e) => self.fail(&mut task, "transfer", &e).await?,
        }
        Ok(task)
    }

    async fn save_and_list(&self, task: &mut Task, captcha: Option<&CaptchaAnswer>) -> Result<()> {
        let remote_dir = task.remote_path(&self.config);

        let present = self.config.pipeline.transfer_policy == TransferPolicy::IfNotPresent
            && !self.remote.list_files(&remote_dir, 0, true).await?.is_empty();
        if present {
            tracing::debug!(
                task_id = %task.id,
                remote_dir = %remote_dir,
                "remote directory not empty, skipping save"
            );
        } else {
            self.remote
                .save_shared_link(
                    &remote_dir,
                    &task.shared_link,
                    &task.shared_password,
                    captcha,
                )
                .await?;
        }

        tracing::info!(task_id = %task.id, remote_dir = %remote_dir, "shared link saved");
        self.notify(task, CallbackAction::LinkSaved);

        // the transfer only counts once its inventory is stored
        let retry = self.remote.list_retry().max_attempts;
        let files = self.remote.list_files(&remote_dir, retry, false).await?;
        task.set_files(files, &remote_dir);
        let now = Utc::now();
        task.transfer_completed_at = Some(now);
        task.file_listed_at = Some(now);
        task.status = Status::Transferred;
        self.db.save_task(task).await?;

        tracing::info!(
            task_id = %task.id,
            files = task.total_files(),
            bytes = task.total_size(),
            "remote files listed"
        );
        self.notify(task, CallbackAction::FilesReady);
        Ok(())
    }
}
