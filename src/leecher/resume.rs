//! Restart and resume operations.

use super::{Leecher, invalid_state};
use crate::error::Result;
use crate::task::{ResumePlan, Task};
use crate::types::TaskId;

impl Leecher {
    /// Send a task back to `Inited`, dropping its transfer progress
    pub async fn restart(&self, id: TaskId) -> Result<Task> {
        let mut task = self.db.require_task(id).await?;
        task.restart_transfer();
        self.db.save_task(&task).await?;
        tracing::info!(task_id = %id, retry_times = task.retry_times, "task restarted");
        Ok(task)
    }

    /// Send a transferred task back to `Transferred`, redoing samples and full download
    pub async fn restart_downloading(&self, id: TaskId) -> Result<Task> {
        let mut task = self.db.require_task(id).await?;
        if task.file_listed_at.is_none() {
            return Err(invalid_state(&task, "restart downloading"));
        }
        task.restart_downloading();
        self.db.save_task(&task).await?;
        tracing::info!(task_id = %id, retry_times = task.retry_times, "downloading restarted");
        Ok(task)
    }

    /// Put a failed task back into the pipeline at its failed stage
    ///
    /// Operator triggered, so the failure is not classified first.
    pub async fn resume(&self, id: TaskId) -> Result<(Task, ResumePlan)> {
        let mut task = self.db.require_task(id).await?;
        let plan = task.schedule_resume();
        if plan.changed() {
            self.db.save_task(&task).await?;
            tracing::info!(task_id = %id, plan = ?plan, "task resumed");
        }
        Ok((task, plan))
    }

    /// Resume failed tasks whose failure is recoverable and whose retry budget is left
    ///
    /// Every failed task is looked at, `page_size` rows at a time, so tasks that stay
    /// failed never hide newer ones. Returns the resumed task ids. A task whose save
    /// fails is logged and skipped.
    pub async fn resume_failed(&self, page_size: i64) -> Result<Vec<TaskId>> {
        let retry_limit = self.config.pipeline.retry_limit;
        let page_size = page_size.max(1);
        let mut resumed = Vec::new();
        let mut after = TaskId(0);

        loop {
            let page = self.db.list_failed(after, page_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            after = last.id;
            let full_page = page.len() as i64 == page_size;

            for mut task in page {
                if !task.recoverable() {
                    tracing::debug!(
                        task_id = %task.id,
                        message = %task.message,
                        "not recoverable, skipping"
                    );
                    continue;
                }
                if task.retry_times >= retry_limit {
                    tracing::debug!(
                        task_id = %task.id,
                        retry_times = task.retry_times,
                        retry_limit,
                        "retry limit reached, skipping"
                    );
                    continue;
                }

                let plan = task.schedule_resume();
                if !plan.changed() {
                    continue;
                }
                match self.db.save_task(&task).await {
                    Ok(()) => {
                        tracing::info!(task_id = %task.id, plan = ?plan, "failed task resumed");
                        resumed.push(task.id);
                    }
                    Err(e) => {
                        tracing::error!(task_id = %task.id, error = %e, "failed to save resumed task")
                    }
                }
            }

            if !full_page {
                break;
            }
        }
        Ok(resumed)
    }
}
