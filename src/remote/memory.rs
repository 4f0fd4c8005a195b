//! In-memory remote provider
//!
//! Holds shares and a remote file tree in memory. Used by tests and for dry runs of
//! the pipeline without provider credentials. Failures, captchas and slow listings
//! can be scripted.

use super::sanitize::describe_code;
use super::traits::{CaptchaAnswer, LIST_NOT_READY_CODE, RemoteClient, remote_file_name};
use crate::config::RetryConfig;
use crate::error::{Error, RemoteError, Result};
use crate::shared_link::SharedLink;
use crate::types::{CaptchaChallenge, RemoteFile};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// Operation a scripted failure applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`RemoteClient::list_dir`]
    List,
    /// [`RemoteClient::save_shared_link`]
    Save,
    /// [`RemoteClient::download_file`]
    Download,
    /// [`RemoteClient::delete`]
    Delete,
}

#[derive(Default)]
struct Share {
    password: String,
    files: Vec<(String, Vec<u8>)>,
}

#[derive(Default)]
struct State {
    shares: HashMap<String, Share>,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    failures: HashMap<Operation, VecDeque<RemoteError>>,
    captcha: Option<(CaptchaChallenge, String)>,
    not_ready_lists: u32,
    calls: HashMap<Operation, u32>,
}

fn provider(code: i64) -> Error {
    Error::Remote(RemoteError::Provider {
        code,
        message: describe_code(code).unwrap_or("unknown").to_string(),
    })
}

/// In-memory [`RemoteClient`]
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    /// Empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a share; file paths are relative to the share root
    pub async fn add_share(&self, shared_id: &str, password: &str, files: Vec<(String, Vec<u8>)>) {
        self.state.lock().await.shares.insert(
            shared_id.to_string(),
            Share {
                password: password.to_string(),
                files,
            },
        );
    }

    /// Put a file straight into the remote tree
    pub async fn put_file(&self, remote_path: &str, content: Vec<u8>) {
        let mut state = self.state.lock().await;
        if let Some((parent, _)) = remote_path.rsplit_once('/') {
            state.dirs.insert(parent.to_string());
        }
        state.files.insert(remote_path.to_string(), content);
    }

    /// Fail the next call of `operation` with `error`
    pub async fn fail_next(&self, operation: Operation, error: RemoteError) {
        self.state
            .lock()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Demand `challenge` on the next save; `code` solves it
    pub async fn require_captcha(&self, challenge: CaptchaChallenge, code: &str) {
        self.state.lock().await.captcha = Some((challenge, code.to_string()));
    }

    /// Answer the next `count` listings with "not listable yet"
    pub async fn delay_listing(&self, count: u32) {
        self.state.lock().await.not_ready_lists = count;
    }

    /// Number of calls made to `operation`
    pub async fn calls(&self, operation: Operation) -> u32 {
        self.state
            .lock()
            .await
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Whether `remote_path` exists as a file
    pub async fn has_file(&self, remote_path: &str) -> bool {
        self.state.lock().await.files.contains_key(remote_path)
    }

    async fn begin(&self, operation: Operation) -> Result<tokio::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().await;
        *state.calls.entry(operation).or_default() += 1;
        if let Some(error) = state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(Error::Remote(error));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteClient for MemoryRemote {
    fn list_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    async fn list_dir(&self, remote_dir: &str) -> Result<Vec<RemoteFile>> {
        let mut state = self.begin(Operation::List).await?;
        if state.not_ready_lists > 0 {
            state.not_ready_lists -= 1;
            return Err(provider(LIST_NOT_READY_CODE));
        }

        let root = remote_dir.trim_end_matches('/');
        if !state.dirs.contains(root) {
            return Err(provider(LIST_NOT_READY_CODE));
        }

        let prefix = format!("{}/", root);
        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for (path, content) in state.files.range(prefix.clone()..) {
            let Some(relative) = path.strip_prefix(&prefix) else {
                break;
            };
            let mut parent = String::new();
            let parts: Vec<&str> = relative.split('/').collect();
            for part in &parts[..parts.len() - 1] {
                if !parent.is_empty() {
                    parent.push('/');
                }
                parent.push_str(part);
                dirs.insert(format!("{}{}", prefix, parent));
            }
            entries.push(RemoteFile {
                path: path.clone(),
                is_dir: false,
                is_file: true,
                size: content.len() as u64,
                md5: None,
            });
        }
        entries.extend(dirs.into_iter().map(|path| RemoteFile {
            path,
            is_dir: true,
            is_file: false,
            size: 0,
            md5: None,
        }));
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn save_shared_link(
        &self,
        remote_dir: &str,
        link: &str,
        password: &str,
        captcha: Option<&CaptchaAnswer>,
    ) -> Result<()> {
        let mut state = self.begin(Operation::Save).await?;

        if let Some((challenge, expected)) = state.captcha.clone() {
            match captcha {
                Some(answer) if answer.captcha_id == challenge.captcha_id && answer.code == expected => {
                    state.captcha = None;
                }
                _ => return Err(Error::CaptchaRequired(challenge)),
            }
        }

        let shared = SharedLink::parse(link, Some(password))?;
        let root = remote_dir.trim_end_matches('/').to_string();
        let files = {
            let share = state.shares.get(&shared.shared_id).ok_or_else(|| provider(105))?;
            if share.password != shared.shared_password {
                return Err(provider(-12));
            }
            share.files.clone()
        };

        state.dirs.insert(root.clone());
        for (relative, content) in files {
            let path = format!("{}/{}", root, relative.trim_start_matches('/'));
            state.files.entry(path).or_insert(content);
        }
        Ok(())
    }

    async fn download_file(
        &self,
        remote_path: &str,
        local_dir: &Path,
        expected_size: u64,
        byte_limit: u64,
    ) -> Result<u64> {
        let content = {
            let state = self.begin(Operation::Download).await?;
            state.files.get(remote_path).cloned().ok_or_else(|| provider(-9))?
        };

        let take = if byte_limit > 0 {
            content.len().min(byte_limit as usize)
        } else {
            content.len()
        };
        if byte_limit == 0 && expected_size != content.len() as u64 {
            tracing::debug!(
                remote_path,
                expected_size,
                actual = content.len(),
                "size differs from listing"
            );
        }

        tokio::fs::create_dir_all(local_dir).await?;
        tokio::fs::write(local_dir.join(remote_file_name(remote_path)), &content[..take]).await?;
        Ok(take as u64)
    }

    async fn delete(&self, remote_dir: &str) -> Result<()> {
        let mut state = self.begin(Operation::Delete).await?;
        let root = remote_dir.trim_end_matches('/').to_string();
        let prefix = format!("{}/", root);
        state.files.retain(|path, _| !path.starts_with(&prefix) && *path != root);
        state.dirs.retain(|dir| !dir.starts_with(&prefix) && *dir != root);
        Ok(())
    }
}
