//! Core types for baidupcs-leecher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a task
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Pipeline position of a task
///
/// Ordered: a task only moves forward through these, except through an explicit restart.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Status {
    /// Created, waiting for the transfer poller
    Inited,
    /// Transfer of the shared link is in progress (or waiting for a captcha code)
    Started,
    /// Shared content is in our remote directory and listed
    Transferred,
    /// Samples of every file are on local disk
    SampleDownloaded,
    /// Every file is on local disk
    Finished,
}

impl Status {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Inited => "Inited",
            Status::Started => "Started",
            Status::Transferred => "Transferred",
            Status::SampleDownloaded => "SampleDownloaded",
            Status::Finished => "Finished",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Inited" => Ok(Status::Inited),
            "Started" => Ok(Status::Started),
            "Transferred" => Ok(Status::Transferred),
            "SampleDownloaded" => Ok(Status::SampleDownloaded),
            "Finished" => Ok(Status::Finished),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for Status {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <String as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Status {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Status {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        raw.parse::<Status>().map_err(Into::into)
    }
}

/// Named step of the task pipeline
///
/// A stage's label is derived from status and timestamps, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the transfer poller to pick the task up
    WaitingAssign,
    /// Saving the shared link into our remote directory
    Transferring,
    /// Downloading the head of every file
    DownloadingSamplings,
    /// Waiting for an operator (or policy) to permit the full download
    WaitingPermitDownload,
    /// Downloading every file in full
    DownloadingFiles,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 5] = [
        Stage::WaitingAssign,
        Stage::Transferring,
        Stage::DownloadingSamplings,
        Stage::WaitingPermitDownload,
        Stage::DownloadingFiles,
    ];

    /// Stage name as exposed over the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::WaitingAssign => "waiting_assign",
            Stage::Transferring => "transferring",
            Stage::DownloadingSamplings => "downloading_samplings",
            Stage::WaitingPermitDownload => "waiting_permit_download",
            Stage::DownloadingFiles => "downloading_files",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of one stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Completed
    Done,
    /// In progress
    Doing,
    /// Not reached yet
    Todo,
    /// Was in progress when the task failed
    Failed,
}

/// How a failed task gets back into the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResumeAction {
    /// Reset to `Inited` and redo the transfer
    Restart,
    /// Reset to `Transferred` and redo sampling and downloading
    RestartDownloading,
}

impl ResumeAction {
    /// Status the task is reset to
    pub fn target_status(&self) -> Status {
        match self {
            ResumeAction::Restart => Status::Inited,
            ResumeAction::RestartDownloading => Status::Transferred,
        }
    }

    /// Operation name as exposed over the API
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeAction::Restart => "restart",
            ResumeAction::RestartDownloading => "restart_downloading",
        }
    }
}

/// Policy for the transfer runner when the task's remote directory already has content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransferPolicy {
    /// Always call the provider's transfer operation
    Always,
    /// Skip the transfer call if the remote directory is non-empty
    #[default]
    IfNotPresent,
}

impl std::str::FromStr for TransferPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(TransferPolicy::Always),
            "if_not_present" => Ok(TransferPolicy::IfNotPresent),
            other => Err(format!("unknown transfer policy '{}'", other)),
        }
    }
}

/// One entry of a remote directory listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RemoteFile {
    /// Remote path (relative to the task's remote directory once stored on a task)
    pub path: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Whether the entry is a regular file
    pub is_file: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Provider checksum (md5), if any
    #[serde(default)]
    pub md5: Option<String>,
}

/// A file found under a task's local directory
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LocalFile {
    /// Path relative to the task's local data directory
    pub path: String,
    /// Size in bytes on disk
    pub size: u64,
}

/// A captcha the provider wants solved before it accepts the shared link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CaptchaChallenge {
    /// Provider captcha id, echoed back with the solved code
    pub captcha_id: String,
    /// URL of the captcha image
    pub captcha_url: String,
    /// Image bytes
    #[serde(skip)]
    pub image: Vec<u8>,
}

/// Action names posted to a task's callback URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallbackAction {
    /// Transfer suspended until a captcha code is submitted
    CaptchaRequired,
    /// Shared link saved into the remote directory
    LinkSaved,
    /// Remote files listed
    FilesReady,
    /// Samples downloaded
    SamplingDownloaded,
    /// Every file downloaded
    FilesDownloaded,
}

/// Serialized view of a task, returned by the API and posted to callbacks
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskInfo {
    /// Task ID
    pub id: TaskId,
    /// Local data directory
    pub path: String,
    /// Local sample directory
    pub sample_path: String,
    /// Shared link id
    pub shared_id: String,
    /// Raw shared link
    pub shared_link: String,
    /// Shared link password
    pub shared_password: String,
    /// Pipeline status
    pub status: Status,
    /// Callback URL
    pub callback: Option<String>,
    /// When the task was created
    pub created_at: DateTime<Utc>,
    /// When the transfer started
    pub started_at: Option<DateTime<Utc>>,
    /// When the full download finished
    pub finished_at: Option<DateTime<Utc>>,
    /// When the shared link was saved
    pub transfer_completed_at: Option<DateTime<Utc>>,
    /// When remote files were listed
    pub file_listed_at: Option<DateTime<Utc>>,
    /// When samples were downloaded
    pub sample_downloaded_at: Option<DateTime<Utc>>,
    /// When every file was downloaded
    pub full_downloaded_at: Option<DateTime<Utc>>,
    /// Whether the full download is permitted
    pub full_download_now: bool,
    /// Number of remote files
    pub total_files: usize,
    /// Total size of remote files in bytes
    pub total_size: u64,
    /// Path of the largest remote file
    pub largest_file: Option<String>,
    /// Size of the largest remote file
    pub largest_file_size: Option<u64>,
    /// Current stage, `None` once every stage is done
    pub current_progressing_stage: Option<Stage>,
    /// Whether the task is currently downloading files
    pub is_downloading: bool,
    /// Whether every file was downloaded
    pub done: bool,
    /// Whether the last attempt failed
    pub failed: bool,
    /// Whether the failure is worth an automatic retry
    pub recoverable: bool,
    /// Failed but every stage computes as done; resume cannot act on it
    pub inconsistent: bool,
    /// Number of restarts
    pub retry_times: i64,
    /// Last failure message
    pub message: String,
    /// Whether a captcha code is awaited
    pub captcha_required: bool,
    /// Captcha image URL
    pub captcha_url: Option<String>,
}

/// Body posted to a task's callback URL
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackPayload {
    /// What happened
    pub action: CallbackAction,
    /// Task state after it happened
    pub task: TaskInfo,
}

/// A page of tasks
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskPage {
    /// Total number of matching tasks
    pub count: i64,
    /// Page number (1-based)
    pub page: i64,
    /// Page size
    pub per_page: i64,
    /// Tasks on this page, newest first
    pub results: Vec<TaskInfo>,
}
