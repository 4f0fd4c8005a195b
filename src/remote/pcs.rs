//! Baidu PCS client over HTTP
//!
//! Talks to the provider's web endpoints with the operator's session cookies. Every
//! JSON answer carries an `errno` (or `error_code`); non-zero codes become
//! [`RemoteError::Provider`] with a sanitized message.

use super::sanitize::{provider_message, sanitize_message};
use super::traits::{CAPTCHA_NEEDED_CODE, CaptchaAnswer, RemoteClient, remote_file_name};
use crate::config::{Config, RemoteConfig, RetryConfig};
use crate::error::{Error, RemoteError, Result};
use crate::shared_link::SharedLink;
use crate::types::{CaptchaChallenge, RemoteFile};
use crate::utils::parse_cookies;
use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, RANGE, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

const PCS_USER_AGENT: &str = "netdisk;P2SP;3.0.0.127";
const PCS_APP_ID: &str = "250528";
const LIST_PAGE_SIZE: u32 = 1000;

/// Transfer answered with "already exists"
const ALREADY_EXISTS_CODE: i64 = 12;
/// Transfer batch too large, retry item by item
const SPLIT_TRANSFER_CODES: [i64; 3] = [-33, 4, 130];
/// Directory does not exist
const NOT_FOUND_CODE: i64 = -9;

fn request_error(e: reqwest::Error) -> Error {
    Error::Remote(RemoteError::Request(sanitize_message(&e.to_string())))
}

fn malformed(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Remote(RemoteError::Malformed(format!("{}: {}", what, e)))
}

/// Turn a non-zero `errno` / `error_code` into an error
fn check_errno(body: &Value) -> Result<()> {
    let code = body
        .get("errno")
        .or_else(|| body.get("error_code"))
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    let raw = body
        .get("show_msg")
        .or_else(|| body.get("error_msg"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    Err(Error::Remote(RemoteError::Provider {
        code,
        message: provider_message(code, &raw),
    }))
}

#[derive(Debug, Deserialize)]
struct ListAllPage {
    #[serde(default)]
    list: Vec<ListEntry>,
    #[serde(default)]
    has_more: i64,
    #[serde(default)]
    cursor: u64,
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    path: String,
    #[serde(default)]
    isdir: i64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    md5: Option<String>,
    #[serde(default)]
    server_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirListing {
    #[serde(default)]
    list: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
struct SharedListing {
    share_id: u64,
    uk: u64,
    #[serde(default)]
    list: Vec<SharedEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SharedEntry {
    fs_id: u64,
    path: String,
    #[serde(default)]
    isdir: i64,
    #[serde(default)]
    server_filename: Option<String>,
}

impl SharedEntry {
    fn name(&self) -> &str {
        self.server_filename
            .as_deref()
            .unwrap_or_else(|| remote_file_name(&self.path))
    }
}

#[derive(Debug, Deserialize)]
struct VerifyAnswer {
    #[serde(default)]
    randsk: String,
}

#[derive(Debug, Deserialize)]
struct CaptchaAnswerBody {
    vcode_str: String,
    vcode_img: String,
}

/// [`RemoteClient`] for pan.baidu.com
pub struct BaiduPcsClient {
    http: reqwest::Client,
    base_url: String,
    cookies: BTreeMap<String, String>,
    list_retry: RetryConfig,
    bdstoken: OnceCell<String>,
}

impl BaiduPcsClient {
    /// Build a client from the remote settings
    pub fn new(remote: &RemoteConfig, list_retry: RetryConfig) -> Result<Self> {
        let mut cookies = parse_cookies(&remote.cookies);
        if !remote.bduss.is_empty() {
            cookies.insert("BDUSS".to_string(), remote.bduss.clone());
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(PCS_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(remote.request_timeout)
            .build()
            .map_err(request_error)?;

        Ok(Self {
            http,
            base_url: remote.base_url.trim_end_matches('/').to_string(),
            cookies,
            list_retry,
            bdstoken: OnceCell::new(),
        })
    }

    /// Build a client from the full configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.remote, config.pipeline.list_retry.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn cookie_header(&self, extra: &[(&str, &str)]) -> String {
        let mut cookies = self.cookies.clone();
        for (k, v) in extra {
            cookies.insert(k.to_string(), v.to_string());
        }
        cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;
        let body: Value = response.json().await.map_err(request_error)?;
        check_errno(&body)?;
        Ok(body)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        extra_cookies: &[(&str, &str)],
    ) -> Result<T> {
        let request = self
            .http
            .get(self.url(path))
            .query(query)
            .header(COOKIE, self.cookie_header(extra_cookies));
        let body = self.send_json(request).await?;
        serde_json::from_value(body).map_err(|e| malformed(path, e))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        form: &[(&str, String)],
        extra_cookies: &[(&str, &str)],
    ) -> Result<T> {
        let request = self
            .http
            .post(self.url(path))
            .query(query)
            .form(form)
            .header(COOKIE, self.cookie_header(extra_cookies));
        let body = self.send_json(request).await?;
        serde_json::from_value(body).map_err(|e| malformed(path, e))
    }

    async fn bdstoken(&self) -> Result<&str> {
        let token = self
            .bdstoken
            .get_or_try_init(|| async {
                let body: Value = self
                    .get(
                        "/api/gettemplatevariable",
                        &[("fields", r#"["bdstoken"]"#.to_string())],
                        &[],
                    )
                    .await?;
                body.pointer("/result/bdstoken")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| malformed("bdstoken", "missing in template variables"))
            })
            .await?;
        Ok(token.as_str())
    }

    /// Verify the share password, returning the `randsk` session key
    async fn access_shared(
        &self,
        surl: &str,
        password: &str,
        captcha: Option<&CaptchaAnswer>,
    ) -> Result<String> {
        let bdstoken = self.bdstoken().await?.to_string();
        let (vcode, vcode_str) = match captcha {
            Some(answer) => (answer.code.clone(), answer.captcha_id.clone()),
            None => (String::new(), String::new()),
        };
        let answer: Result<VerifyAnswer> = self
            .post(
                "/share/verify",
                &[
                    ("surl", surl.to_string()),
                    ("bdstoken", bdstoken),
                    ("t", chrono::Utc::now().timestamp_millis().to_string()),
                ],
                &[
                    ("pwd", password.to_string()),
                    ("vcode", vcode),
                    ("vcode_str", vcode_str),
                ],
                &[],
            )
            .await;

        match answer {
            Ok(answer) => Ok(answer.randsk),
            Err(e) if e.remote_code() == Some(CAPTCHA_NEEDED_CODE) => {
                Err(Error::CaptchaRequired(self.fetch_captcha().await?))
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_captcha(&self) -> Result<CaptchaChallenge> {
        let body: CaptchaAnswerBody = self
            .get("/api/getcaptcha", &[("prod", "shareverify".to_string())], &[])
            .await?;
        let image = self
            .http
            .get(&body.vcode_img)
            .header(COOKIE, self.cookie_header(&[]))
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?
            .bytes()
            .await
            .map_err(request_error)?;

        tracing::info!(captcha_id = %body.vcode_str, "provider asks for a captcha");
        Ok(CaptchaChallenge {
            captcha_id: body.vcode_str,
            captcha_url: body.vcode_img,
            image: image.to_vec(),
        })
    }

    /// Names directly inside `remote_dir`, `None` if it does not exist
    async fn dir_names(&self, remote_dir: &str) -> Result<Option<HashSet<String>>> {
        let mut names = HashSet::new();
        let mut page_number = 1u32;
        loop {
            let listing: Result<DirListing> = self
                .get(
                    "/api/list",
                    &[
                        ("dir", remote_dir.to_string()),
                        ("page", page_number.to_string()),
                        ("num", LIST_PAGE_SIZE.to_string()),
                    ],
                    &[],
                )
                .await;
            let listing = match listing {
                Ok(listing) => listing,
                Err(e) if e.remote_code() == Some(NOT_FOUND_CODE) => return Ok(None),
                Err(e) => return Err(e),
            };

            let last_page = listing.list.len() < LIST_PAGE_SIZE as usize;
            names.extend(listing.list.into_iter().map(|e| {
                e.server_filename
                    .unwrap_or_else(|| remote_file_name(&e.path).to_string())
            }));
            if last_page {
                return Ok(Some(names));
            }
            page_number += 1;
        }
    }

    async fn make_dir(&self, remote_dir: &str) -> Result<()> {
        let bdstoken = self.bdstoken().await?.to_string();
        let _: Value = self
            .post(
                "/api/create",
                &[("a", "commit".to_string()), ("bdstoken", bdstoken)],
                &[
                    ("path", remote_dir.to_string()),
                    ("isdir", "1".to_string()),
                    ("block_list", "[]".to_string()),
                ],
                &[],
            )
            .await?;
        Ok(())
    }

    /// Top-level entries of a share, every page of them
    async fn shared_listing(&self, surl: &str, randsk: &str) -> Result<SharedListing> {
        let mut listing: Option<SharedListing> = None;
        let mut page_number = 1u32;
        loop {
            let page: SharedListing = self
                .get(
                    "/share/list",
                    &[
                        ("shorturl", surl.to_string()),
                        ("root", "1".to_string()),
                        ("page", page_number.to_string()),
                        ("num", LIST_PAGE_SIZE.to_string()),
                    ],
                    &[("BDCLND", randsk)],
                )
                .await?;

            let last_page = page.list.len() < LIST_PAGE_SIZE as usize;
            match listing.as_mut() {
                Some(listing) => listing.list.extend(page.list),
                None => listing = Some(page),
            }
            if last_page {
                break;
            }
            page_number += 1;
        }
        listing.ok_or_else(|| malformed("share list", "no page returned"))
    }

    async fn transfer(
        &self,
        listing: &SharedListing,
        fs_ids: &[u64],
        remote_dir: &str,
        randsk: &str,
    ) -> Result<()> {
        let bdstoken = self.bdstoken().await?.to_string();
        let fsidlist = serde_json::to_string(fs_ids).map_err(|e| malformed("fsidlist", e))?;
        let _: Value = self
            .post(
                "/share/transfer",
                &[
                    ("shareid", listing.share_id.to_string()),
                    ("from", listing.uk.to_string()),
                    ("bdstoken", bdstoken),
                    ("ondup", "newcopy".to_string()),
                ],
                &[("fsidlist", fsidlist), ("path", remote_dir.to_string())],
                &[("BDCLND", randsk)],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for BaiduPcsClient {
    fn list_retry(&self) -> RetryConfig {
        self.list_retry.clone()
    }

    async fn list_dir(&self, remote_dir: &str) -> Result<Vec<RemoteFile>> {
        let mut files = Vec::new();
        let mut start = 0u64;
        loop {
            let page: ListAllPage = self
                .get(
                    "/rest/2.0/xpan/multimedia",
                    &[
                        ("method", "listall".to_string()),
                        ("path", remote_dir.to_string()),
                        ("recursion", "1".to_string()),
                        ("start", start.to_string()),
                        ("limit", LIST_PAGE_SIZE.to_string()),
                    ],
                    &[],
                )
                .await?;

            files.extend(page.list.into_iter().map(|e| RemoteFile {
                is_dir: e.isdir == 1,
                is_file: e.isdir != 1,
                size: e.size,
                md5: e.md5.filter(|m| !m.is_empty()),
                path: e.path,
            }));

            if page.has_more != 1 || page.cursor <= start {
                break;
            }
            start = page.cursor;
        }
        Ok(files)
    }

    async fn save_shared_link(
        &self,
        remote_dir: &str,
        link: &str,
        password: &str,
        captcha: Option<&CaptchaAnswer>,
    ) -> Result<()> {
        if !remote_dir.starts_with('/') {
            return Err(Error::Config {
                message: format!("remote directory must be absolute: {}", remote_dir),
                key: Some("remote_root_dir".to_string()),
            });
        }

        let shared = SharedLink::parse(link, Some(password))?;
        // share endpoints take the id without its leading "1"
        let surl = shared
            .shared_id
            .strip_prefix('1')
            .unwrap_or(&shared.shared_id)
            .to_string();

        let randsk = if shared.shared_password.is_empty() {
            String::new()
        } else {
            self.access_shared(&surl, &shared.shared_password, captcha)
                .await?
        };

        let listing = self.shared_listing(&surl, &randsk).await?;

        let existing = match self.dir_names(remote_dir).await? {
            Some(names) => names,
            None => {
                self.make_dir(remote_dir).await?;
                HashSet::new()
            }
        };

        let pending: Vec<SharedEntry> = listing
            .list
            .iter()
            .filter(|entry| {
                let present = entry.isdir != 1 && existing.contains(entry.name());
                if present {
                    tracing::debug!(path = %entry.path, remote_dir, "already transferred, skipping");
                }
                !present
            })
            .cloned()
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let fs_ids: Vec<u64> = pending.iter().map(|e| e.fs_id).collect();
        match self.transfer(&listing, &fs_ids, remote_dir, &randsk).await {
            Ok(()) => Ok(()),
            Err(e) if e.remote_code() == Some(ALREADY_EXISTS_CODE) => {
                tracing::warn!(remote_dir, error = %e, "shared files already in place");
                Ok(())
            }
            Err(e) if e.remote_code().is_some_and(|c| SPLIT_TRANSFER_CODES.contains(&c)) => {
                tracing::warn!(
                    remote_dir,
                    error = %e,
                    count = fs_ids.len(),
                    "transfer batch rejected, transferring one by one"
                );
                for fs_id in fs_ids {
                    match self.transfer(&listing, &[fs_id], remote_dir, &randsk).await {
                        Ok(()) => {}
                        Err(e) if e.remote_code() == Some(ALREADY_EXISTS_CODE) => {}
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn download_file(
        &self,
        remote_path: &str,
        local_dir: &Path,
        expected_size: u64,
        byte_limit: u64,
    ) -> Result<u64> {
        let mut request = self
            .http
            .get(self.url("/rest/2.0/pcs/file"))
            .query(&[
                ("method", "download"),
                ("app_id", PCS_APP_ID),
                ("path", remote_path),
            ])
            .header(COOKIE, self.cookie_header(&[]));
        if byte_limit > 0 {
            request = request.header(RANGE, format!("bytes=0-{}", byte_limit - 1));
        }

        let mut response = request
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;

        tokio::fs::create_dir_all(local_dir).await?;
        let local_path = local_dir.join(remote_file_name(remote_path));
        let mut file = tokio::fs::File::create(&local_path).await?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            let take = if byte_limit > 0 {
                (chunk.len() as u64).min(byte_limit - written) as usize
            } else {
                chunk.len()
            };
            file.write_all(&chunk[..take]).await?;
            written += take as u64;
            if byte_limit > 0 && written >= byte_limit {
                break;
            }
        }
        file.flush().await?;

        if byte_limit == 0 && written < expected_size {
            return Err(Error::Remote(RemoteError::Request(format!(
                "short read of {}: {} of {} bytes",
                remote_path, written, expected_size
            ))));
        }

        tracing::debug!(remote_path, local_path = %local_path.display(), written, "downloaded");
        Ok(written)
    }

    async fn delete(&self, remote_dir: &str) -> Result<()> {
        let bdstoken = self.bdstoken().await?.to_string();
        let filelist = serde_json::to_string(&[remote_dir]).map_err(|e| malformed("filelist", e))?;
        let result: Result<Value> = self
            .post(
                "/api/filemanager",
                &[
                    ("opera", "delete".to_string()),
                    ("async", "0".to_string()),
                    ("bdstoken", bdstoken),
                ],
                &[("filelist", filelist)],
                &[],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.remote_code() == Some(NOT_FOUND_CODE) => {
                tracing::debug!(remote_dir, "remote directory already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for BaiduPcsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaiduPcsClient")
            .field("base_url", &self.base_url)
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}
