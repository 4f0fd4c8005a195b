//! The task entity
//!
//! A [`Task`] is one leech job: a shared link that gets transferred into our remote
//! directory, sampled, and finally downloaded. The pipeline position is the
//! [`Status`]; the finer-grained stage view and the resume policy live in [`stages`]
//! and [`recovery`].

pub mod recovery;
pub mod stages;

use crate::config::Config;
use crate::types::{RemoteFile, ResumeAction, Stage, StageState, Status, TaskId, TaskInfo};
use crate::utils::truncate_message;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A persisted leech job
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    /// Task ID
    pub id: TaskId,
    /// Raw shared link as submitted
    pub shared_link: String,
    /// Share id parsed from the link at creation
    pub shared_id: String,
    /// Share password, empty for public shares
    pub shared_password: String,
    /// Pipeline position
    pub status: Status,
    /// Whether the last attempt at the current status failed
    pub failed: bool,
    /// Last failure message (sanitized, at most 1000 characters)
    pub message: String,
    /// Number of restarts
    pub retry_times: i64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Transfer start
    pub started_at: Option<DateTime<Utc>>,
    /// Shared link saved into the remote directory
    pub transfer_completed_at: Option<DateTime<Utc>>,
    /// Remote files listed
    pub file_listed_at: Option<DateTime<Utc>>,
    /// Samples downloaded
    pub sample_downloaded_at: Option<DateTime<Utc>>,
    /// Every file downloaded
    pub full_downloaded_at: Option<DateTime<Utc>>,
    /// Task reached `Finished`
    pub finished_at: Option<DateTime<Utc>>,
    /// Gate for the full download
    pub full_download_now: bool,
    /// Remote inventory, paths relative to the task's remote directory
    pub files: Vec<RemoteFile>,
    /// Waiting for a captcha code
    pub captcha_required: bool,
    /// Captcha image bytes
    pub captcha: Vec<u8>,
    /// Provider captcha id
    pub captcha_id: String,
    /// Captcha image URL
    pub captcha_url: String,
    /// Captcha code submitted by an operator
    pub captcha_code: String,
    /// URL notified on stage transitions
    pub callback: Option<String>,
}

/// What [`Task::schedule_resume`] decided
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResumePlan {
    /// The task has not failed; nothing to do
    NotFailed,
    /// Failed, yet every stage is done; left untouched
    Inconsistent,
    /// Reset through a restart operation
    Restart(ResumeAction),
    /// No restart maps to the current stage; failure cleared in place
    Reset,
}

impl ResumePlan {
    /// Whether applying the plan changed the task
    pub fn changed(&self) -> bool {
        matches!(self, ResumePlan::Restart(_) | ResumePlan::Reset)
    }
}

impl Task {
    /// Directory name shared by the local and remote copies: `<shared_id>.<shared_password>`
    pub fn path_name(&self) -> String {
        format!("{}.{}", self.shared_id, self.shared_password)
    }

    /// Local directory of the full download
    pub fn data_path(&self, config: &Config) -> PathBuf {
        config.storage.data_root_dir.join(self.path_name())
    }

    /// Local directory of the samples
    pub fn sample_path(&self, config: &Config) -> PathBuf {
        config
            .storage
            .data_root_dir
            .join(format!("{}.sample", self.path_name()))
    }

    /// Remote directory the share is transferred into
    pub fn remote_path(&self, config: &Config) -> String {
        format!(
            "{}/{}",
            config.storage.remote_root_dir.trim_end_matches('/'),
            self.path_name()
        )
    }

    /// Absolute remote path of an inventory entry
    pub fn remote_file_path(&self, config: &Config, file: &RemoteFile) -> String {
        format!("{}/{}", self.remote_path(config), file.path)
    }

    /// Store a listing, stripping `remote_prefix` from paths that live under it
    pub fn set_files(&mut self, files: Vec<RemoteFile>, remote_prefix: &str) {
        let prefix = remote_prefix.trim_end_matches('/');
        self.files = files
            .into_iter()
            .map(|mut file| {
                if let Some(rest) = file.path.strip_prefix(prefix)
                    && let Some(relative) = rest.strip_prefix('/')
                {
                    file.path = relative.to_string();
                }
                file
            })
            .collect();
    }

    /// Regular files of the inventory
    pub fn regular_files(&self) -> impl Iterator<Item = &RemoteFile> {
        self.files.iter().filter(|f| f.is_file)
    }

    /// Number of regular files
    pub fn total_files(&self) -> usize {
        self.regular_files().count()
    }

    /// Total size of regular files
    pub fn total_size(&self) -> u64 {
        self.regular_files().map(|f| f.size).sum()
    }

    /// Largest regular file (first one on ties)
    pub fn largest_file(&self) -> Option<&RemoteFile> {
        self.regular_files()
            .fold(None, |best: Option<&RemoteFile>, f| match best {
                Some(b) if b.size >= f.size => Some(b),
                _ => Some(f),
            })
    }

    /// Stage labels in pipeline order
    pub fn stages(&self) -> Vec<(Stage, StageState)> {
        stages::stages(self)
    }

    /// The stage the task is in, `None` once every stage is done
    pub fn current_stage(&self) -> Option<Stage> {
        stages::current_stage(self)
    }

    /// Restart operation matching the current stage
    pub fn resume_action(&self) -> Option<ResumeAction> {
        self.current_stage().and_then(stages::resume_action)
    }

    /// Every file is on local disk
    pub fn done(&self) -> bool {
        self.status == Status::Finished && self.full_downloaded_at.is_some()
    }

    /// The failure is worth an automatic retry; always false for tasks that have not failed
    pub fn recoverable(&self) -> bool {
        self.failed && recovery::is_recoverable(&self.message)
    }

    /// Failed while every stage computes as done
    pub fn inconsistent(&self) -> bool {
        self.failed && self.current_stage().is_none()
    }

    /// Currently in the full download stage
    pub fn is_downloading(&self) -> bool {
        !self.failed && self.current_stage() == Some(Stage::DownloadingFiles)
    }

    /// Record a failure of the current stage
    pub fn mark_failed(&mut self, message: &str) {
        self.failed = true;
        self.message = truncate_message(message);
    }

    /// Move back to `status` and clear the failure
    ///
    /// Stage timestamps at and after the reset point are cleared so the next pass
    /// records them afresh.
    pub fn restart(&mut self, status: Status) {
        self.status = status;
        self.failed = false;
        self.message.clear();
        self.retry_times += 1;

        if status <= Status::Inited {
            self.started_at = None;
            self.captcha_required = false;
        }
        if status <= Status::Started {
            self.transfer_completed_at = None;
            self.file_listed_at = None;
        }
        if status <= Status::Transferred {
            self.sample_downloaded_at = None;
        }
        if status <= Status::SampleDownloaded {
            self.full_downloaded_at = None;
            self.finished_at = None;
        }
    }

    /// Restart from `Inited`
    pub fn restart_transfer(&mut self) {
        self.restart(ResumeAction::Restart.target_status());
    }

    /// Restart from `Transferred`
    pub fn restart_downloading(&mut self) {
        self.restart(ResumeAction::RestartDownloading.target_status());
    }

    /// Decide how a failed task gets back into the pipeline, without changing it
    pub fn resume_plan(&self) -> ResumePlan {
        if !self.failed {
            return ResumePlan::NotFailed;
        }
        match self.current_stage() {
            None => ResumePlan::Inconsistent,
            Some(stage) => match stages::resume_action(stage) {
                Some(action) => ResumePlan::Restart(action),
                None => ResumePlan::Reset,
            },
        }
    }

    /// Apply [`Task::resume_plan`]
    pub fn schedule_resume(&mut self) -> ResumePlan {
        let plan = self.resume_plan();
        match plan {
            ResumePlan::NotFailed => {}
            ResumePlan::Inconsistent => {
                tracing::warn!(
                    task_id = %self.id,
                    status = %self.status,
                    "task failed but every stage is done, not resuming"
                );
            }
            ResumePlan::Restart(action) => self.restart(action.target_status()),
            ResumePlan::Reset => {
                self.failed = false;
                self.message.clear();
                self.retry_times += 1;
            }
        }
        plan
    }

    /// Serialized view for the API and callbacks
    pub fn to_info(&self, config: &Config) -> TaskInfo {
        let largest = self.largest_file();
        TaskInfo {
            id: self.id,
            path: self.data_path(config).to_string_lossy().into_owned(),
            sample_path: self.sample_path(config).to_string_lossy().into_owned(),
            shared_id: self.shared_id.clone(),
            shared_link: self.shared_link.clone(),
            shared_password: self.shared_password.clone(),
            status: self.status,
            callback: self.callback.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            transfer_completed_at: self.transfer_completed_at,
            file_listed_at: self.file_listed_at,
            sample_downloaded_at: self.sample_downloaded_at,
            full_downloaded_at: self.full_downloaded_at,
            full_download_now: self.full_download_now,
            total_files: self.total_files(),
            total_size: self.total_size(),
            largest_file: largest.map(|f| f.path.clone()),
            largest_file_size: largest.map(|f| f.size),
            current_progressing_stage: self.current_stage(),
            is_downloading: self.is_downloading(),
            done: self.done(),
            failed: self.failed,
            recoverable: self.recoverable(),
            inconsistent: self.inconsistent(),
            retry_times: self.retry_times,
            message: self.message.clone(),
            captcha_required: self.captcha_required,
            captcha_url: if self.captcha_url.is_empty() {
                None
            } else {
                Some(self.captcha_url.clone())
            },
        }
    }
}
