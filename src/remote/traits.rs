//! Contract between the pipeline runners and the remote storage provider

use crate::config::RetryConfig;
use crate::error::{Error, RemoteError, Result};
use crate::retry::retry_when;
use crate::types::RemoteFile;
use async_trait::async_trait;
use std::path::Path;

/// Provider code returned while a freshly transferred directory is not listable yet
pub const LIST_NOT_READY_CODE: i64 = 31066;

/// Provider code asking for a human-solved captcha
pub const CAPTCHA_NEEDED_CODE: i64 = -62;

/// A solved captcha, sent along with the shared link
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptchaAnswer {
    /// Provider captcha id from the challenge
    pub captcha_id: String,
    /// Code read from the captcha image
    pub code: String,
}

/// Trait for the remote storage provider
///
/// Every error message an implementation returns must already be free of credentials;
/// runners store them verbatim.
///
/// # Examples
///
/// ```no_run
/// use baidupcs_leecher::remote::{MemoryRemote, RemoteClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let remote = MemoryRemote::new();
/// remote.add_share("1abc", "pass", vec![("movie/a.mkv".to_string(), vec![0u8; 4096])]).await;
///
/// remote.save_shared_link("/leecher/1abc.pass", "https://pan.baidu.com/s/1abc", "pass", None).await?;
/// let files = remote.list_files("/leecher/1abc.pass", 3, false).await?;
/// assert_eq!(files.iter().filter(|f| f.is_file).count(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Delay schedule used by [`RemoteClient::list_files`] between attempts
    fn list_retry(&self) -> RetryConfig;

    /// List `remote_dir` recursively, one attempt
    ///
    /// Returned paths are absolute.
    async fn list_dir(&self, remote_dir: &str) -> Result<Vec<RemoteFile>>;

    /// List `remote_dir` recursively
    ///
    /// A "not listable yet" answer is retried up to `retry` times. Once retries are
    /// exhausted an empty list is returned if `fail_silent`, the error otherwise.
    async fn list_files(
        &self,
        remote_dir: &str,
        retry: u32,
        fail_silent: bool,
    ) -> Result<Vec<RemoteFile>> {
        let mut config = self.list_retry();
        config.max_attempts = retry;

        let result = retry_when(&config, is_not_ready, || self.list_dir(remote_dir)).await;
        match result {
            Err(e) if fail_silent && is_not_ready(&e) => {
                tracing::debug!(remote_dir, error = %e, "listing not ready, returning empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Save the share behind `link` into `remote_dir`
    ///
    /// Returns [`Error::CaptchaRequired`] when the provider wants a captcha solved; the
    /// call is then repeated with `captcha` set. Entries already present in
    /// `remote_dir` are skipped.
    async fn save_shared_link(
        &self,
        remote_dir: &str,
        link: &str,
        password: &str,
        captcha: Option<&CaptchaAnswer>,
    ) -> Result<()>;

    /// Download `remote_path` into `local_dir/<file name>`
    ///
    /// The local file is recreated from zero. With `byte_limit > 0` the download stops
    /// once that many bytes are written. Returns the number of bytes written.
    async fn download_file(
        &self,
        remote_path: &str,
        local_dir: &Path,
        expected_size: u64,
        byte_limit: u64,
    ) -> Result<u64>;

    /// Delete `remote_dir` and everything below it
    async fn delete(&self, remote_dir: &str) -> Result<()>;
}

fn is_not_ready(e: &Error) -> bool {
    matches!(
        e,
        Error::Remote(RemoteError::Provider { code, .. }) if *code == LIST_NOT_READY_CODE
    )
}

/// File name of a remote path
pub fn remote_file_name(remote_path: &str) -> &str {
    remote_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(remote_path)
}
