//! Configuration types for baidupcs-leecher

use crate::error::{Error, Result};
use crate::types::TransferPolicy;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Local and remote storage layout
///
/// Every task owns `<data_root_dir>/<shared_id>.<shared_password>` (full files),
/// `<data_root_dir>/<shared_id>.<shared_password>.sample` (samples) and
/// `<remote_root_dir>/<shared_id>.<shared_password>` on the provider side.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Local root for task directories (default: "/tmp/baidupcsleecher")
    #[serde(default = "default_data_root_dir")]
    pub data_root_dir: PathBuf,

    /// Remote root for transferred shares, must be absolute (default: "/leecher")
    #[serde(default = "default_remote_root_dir")]
    pub remote_root_dir: String,

    /// Bytes downloaded per file by the sampling runner (default: 10240)
    #[serde(default = "default_sample_byte_limit")]
    pub sample_byte_limit: u64,

    /// Remote paths matching this regex are never downloaded
    #[serde(default = "default_ignore_path_regex")]
    pub ignore_path_regex: String,

    /// Free space guard for full downloads
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root_dir: default_data_root_dir(),
            remote_root_dir: default_remote_root_dir(),
            sample_byte_limit: default_sample_byte_limit(),
            ignore_path_regex: default_ignore_path_regex(),
            disk_space: DiskSpaceConfig::default(),
        }
    }
}

/// Disk space checking configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space to keep after a full download (default: 100 MB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
        }
    }
}

/// Pipeline and poller behavior
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineConfig {
    /// What the transfer runner does when the remote directory already has content
    #[serde(default)]
    pub transfer_policy: TransferPolicy,

    /// Initial `full_download_now` of new tasks (default: false)
    #[serde(default)]
    pub full_download_immediately_default: bool,

    /// The resume poller leaves tasks alone once `retry_times` reaches this (default: 5)
    #[serde(default = "default_retry_limit")]
    pub retry_limit: i64,

    /// Sleep between poller sweeps, in seconds (default: 5)
    #[serde(default = "default_poll_sleep_seconds")]
    pub poll_sleep_seconds: u64,

    /// Maximum tasks handled per sweep (default: 20)
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Retry of the provider's "too frequent" error while listing remote files
    #[serde(default = "default_list_retry")]
    pub list_retry: RetryConfig,

    /// A sampling or leech claim older than this is taken over (default: 12 hours)
    #[serde(default = "default_claim_timeout", with = "duration_serde")]
    pub claim_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transfer_policy: TransferPolicy::default(),
            full_download_immediately_default: false,
            retry_limit: default_retry_limit(),
            poll_sleep_seconds: default_poll_sleep_seconds(),
            batch_size: default_batch_size(),
            list_retry: default_list_retry(),
            claim_timeout: default_claim_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Sleep between poller sweeps
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_sleep_seconds)
    }
}

/// Retry configuration for transient provider failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 3 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for backoff, 1.0 keeps the delay fixed (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Remote provider credentials and endpoint
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoteConfig {
    /// BDUSS session cookie
    #[serde(default)]
    pub bduss: String,

    /// Raw cookie header string (`k1=v1; k2=v2`)
    #[serde(default)]
    pub cookies: String,

    /// Provider base URL (default: "https://pan.baidu.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bduss: String::new(),
            cookies: String::new(),
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Callback notification configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CallbackConfig {
    /// Timeout for callback requests (default: 30 seconds)
    #[serde(default = "default_callback_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout: default_callback_timeout(),
        }
    }
}

/// Data storage and state management
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "./baidupcsleecher.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,

    /// Default page size of task listings (default: 20)
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
            page_size: default_page_size(),
        }
    }
}

/// Main configuration for the leecher
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Local and remote storage layout
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pipeline and poller behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Remote provider credentials
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Callback notifications
    #[serde(default)]
    pub callback: CallbackConfig,

    /// Database location
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API server
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration: defaults, then the optional JSON file, then `.env` and
    /// process environment overrides. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        // A missing .env file is the normal case
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!(error = %e, "failed to read .env file");
        }

        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
            key: None,
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid config file {}: {}", path.display(), e),
            key: None,
        })
    }

    /// Apply overrides from environment-style variables looked up through `lookup`
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATA_DIR") {
            self.storage.data_root_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("REMOTE_LEECHER_DIR") {
            self.storage.remote_root_dir = v;
        }
        if let Some(v) = lookup("SAMPLE_SIZE") {
            self.storage.sample_byte_limit = parse_env("SAMPLE_SIZE", &v)?;
        }
        if let Some(v) = lookup("IGNORE_PATH_RE") {
            self.storage.ignore_path_regex = v;
        }
        if let Some(v) = lookup("RUNNER_SLEEP_SECONDS") {
            self.pipeline.poll_sleep_seconds = parse_env("RUNNER_SLEEP_SECONDS", &v)?;
        }
        if let Some(v) = lookup("FULL_DOWNLOAD_IMMEDIATELY") {
            self.pipeline.full_download_immediately_default = parse_bool(&v);
        }
        if let Some(v) = lookup("RETRY_TIMES_LIMIT") {
            self.pipeline.retry_limit = parse_env("RETRY_TIMES_LIMIT", &v)?;
        }
        if let Some(v) = lookup("TRANSFER_POLICY") {
            self.pipeline.transfer_policy =
                v.parse().map_err(|message: String| Error::Config {
                    message,
                    key: Some("TRANSFER_POLICY".to_string()),
                })?;
        }
        if let Some(v) = lookup("PAN_BAIDU_BDUSS") {
            self.remote.bduss = v;
        }
        if let Some(v) = lookup("PAN_BAIDU_COOKIES") {
            self.remote.cookies = v;
        }
        if let Some(v) = lookup("DB_NAME") {
            self.persistence.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("API_PAGE_SIZE") {
            self.api.page_size = parse_env("API_PAGE_SIZE", &v)?;
        }
        Ok(())
    }

    /// Reject settings the runners cannot work with
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = regex::Regex::new(&self.storage.ignore_path_regex) {
            return Err(Error::Config {
                message: format!("invalid ignore_path_regex: {}", e),
                key: Some("ignore_path_regex".to_string()),
            });
        }
        if !self.storage.remote_root_dir.starts_with('/') {
            return Err(Error::Config {
                message: format!(
                    "remote_root_dir must be an absolute path, got '{}'",
                    self.storage.remote_root_dir
                ),
                key: Some("remote_root_dir".to_string()),
            });
        }
        if self.pipeline.batch_size <= 0 {
            return Err(Error::Config {
                message: "batch_size must be greater than zero".to_string(),
                key: Some("batch_size".to_string()),
            });
        }
        if self.api.page_size <= 0 {
            return Err(Error::Config {
                message: "page_size must be greater than zero".to_string(),
                key: Some("page_size".to_string()),
            });
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("invalid value '{}': {}", value, e),
        key: Some(key.to_string()),
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_data_root_dir() -> PathBuf {
    PathBuf::from("/tmp/baidupcsleecher")
}

fn default_remote_root_dir() -> String {
    "/leecher".to_string()
}

fn default_sample_byte_limit() -> u64 {
    10240
}

fn default_ignore_path_regex() -> String {
    ".*__MACOSX.*|.*spam.*".to_string()
}

fn default_min_free_space() -> u64 {
    100 * 1024 * 1024
}

fn default_retry_limit() -> i64 {
    5
}

fn default_poll_sleep_seconds() -> u64 {
    5
}

fn default_batch_size() -> i64 {
    20
}

fn default_list_retry() -> RetryConfig {
    RetryConfig::default()
}

fn default_claim_timeout() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_base_url() -> String {
    "https://pan.baidu.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_callback_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./baidupcsleecher.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_page_size() -> i64 {
    20
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
