//! Configuration types for a data app
//!
//! An [`AppConfig`] is either loaded from YAML or assembled from the app's
//! secrets with [`AppConfig::from_secrets`]:
//!
//! ```yaml
//! storage:
//!   root_url: https://connection.keboola.com
//!   token: "123-abcdef"
//!   tmp_data_folder: tmp/
//! auth:
//!   required_role: admin
//! selection:
//!   placement: sidebar
//!   linked: include
//! warehouse:
//!   database: ":memory:"
//! ```

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::selection::LinkedBuckets;
use crate::session::SecretsProvider;
use crate::types::{BackoffType, Placement};
use crate::warehouse::WarehouseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Secret holding the Storage API root URL
pub const SECRET_URL: &str = "kbc_url";
/// Secret holding the Storage API token
pub const SECRET_TOKEN: &str = "kbc_token";
/// Secret holding the role required to use the app
pub const SECRET_REQUIRED_ROLE: &str = "kbc_required_role";
/// Secret holding the warehouse database path
pub const SECRET_WAREHOUSE_DATABASE: &str = "warehouse.database";

// ============================================================================
// Top-Level App Config
// ============================================================================

/// Complete data app configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage API connection
    pub storage: StorageConfig,

    /// Access control
    #[serde(default)]
    pub auth: AccessConfig,

    /// Table picker defaults
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Optional warehouse connection
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
}

impl AppConfig {
    /// Minimal config for a Storage API endpoint
    pub fn new(root_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            storage: StorageConfig::new(root_url, token),
            auth: AccessConfig::default(),
            selection: SelectionConfig::default(),
            warehouse: None,
        }
    }

    /// Parse and validate a YAML config document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.auth.required_role = non_blank(config.auth.required_role.take());
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Build the config from the app's secrets
    ///
    /// `kbc_url` and `kbc_token` are required; `kbc_required_role` and
    /// `warehouse.database` are optional.
    pub fn from_secrets(secrets: &dyn SecretsProvider) -> Result<Self> {
        let mut config = Self::new(
            secrets.require(SECRET_URL)?,
            secrets.require(SECRET_TOKEN)?,
        );
        config.auth.required_role = non_blank(secrets.secret(SECRET_REQUIRED_ROLE));
        config.warehouse = non_blank(secrets.secret(SECRET_WAREHOUSE_DATABASE)).map(WarehouseConfig::new);
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check
    pub fn validate(&self) -> Result<()> {
        self.storage.validate()
    }

    /// Set the required role
    #[must_use]
    pub fn with_required_role(mut self, role: impl Into<String>) -> Self {
        self.auth.required_role = non_blank(Some(role.into()));
        self
    }

    /// Set the temporary data folder
    #[must_use]
    pub fn with_tmp_data_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.storage.tmp_data_folder = folder.into();
        self
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Storage API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root URL of the stack, e.g. `https://connection.keboola.com`
    pub root_url: String,

    /// Storage API token
    #[serde(skip_serializing)]
    pub token: String,

    /// Folder exported tables are materialized in
    #[serde(default = "default_tmp_data_folder")]
    pub tmp_data_folder: PathBuf,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Async job polling settings
    #[serde(default)]
    pub jobs: JobPollConfig,
}

impl StorageConfig {
    pub fn new(root_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into(),
            token: token.into(),
            tmp_data_folder: default_tmp_data_folder(),
            http: HttpConfig::default(),
            jobs: JobPollConfig::default(),
        }
    }

    /// Check the root URL and token
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.root_url)
            .map_err(|e| Error::invalid_value("storage.root_url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "storage.root_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.token.trim().is_empty() {
            return Err(Error::missing_field("storage.token"));
        }
        Ok(())
    }

    /// Root URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.root_url.trim_end_matches('/')
    }

    /// HTTP client config for this connection
    pub fn http_client_config(&self) -> HttpClientConfig {
        let http = &self.http;
        HttpClientConfig::builder()
            .base_url(self.base_url())
            .timeout(Duration::from_secs(http.timeout_seconds))
            .max_retries(http.max_retries)
            .backoff(
                http.retry_backoff.backoff_type,
                Duration::from_millis(http.retry_backoff.initial_ms),
                Duration::from_millis(http.retry_backoff.max_ms),
            )
            .max_retry_after(Duration::from_secs(http.max_retry_after_seconds))
            .rate_limit(http.rate_limit.clone())
            .build()
    }
}

/// Blank secrets count as unset
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_tmp_data_folder() -> PathBuf {
    PathBuf::from("tmp/")
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Client-side rate limit; `null` disables it
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimiterConfig>,

    /// Longest server-requested 429 wait honoured before giving up
    #[serde(default = "default_max_retry_after")]
    pub max_retry_after_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: default_rate_limit(),
            max_retry_after_seconds: default_max_retry_after(),
        }
    }
}

fn default_max_retry_after() -> u64 {
    120
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_rate_limit() -> Option<RateLimiterConfig> {
    Some(RateLimiterConfig::default())
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    200
}

fn default_max_ms() -> u64 {
    30_000
}

/// Polling of asynchronous Storage jobs (table exports)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPollConfig {
    /// Delay between polls in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Give up after this many seconds
    #[serde(default = "default_max_wait")]
    pub max_wait_seconds: u64,
}

impl Default for JobPollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_wait_seconds: default_max_wait(),
        }
    }
}

impl JobPollConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_wait() -> u64 {
    600
}

// ============================================================================
// Access + Selection
// ============================================================================

/// Access control settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Role a user must hold; unset or empty lets every signed-in user in
    #[serde(default)]
    pub required_role: Option<String>,
}

/// Table picker settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Where the picker renders
    #[serde(default)]
    pub placement: Placement,

    /// Which buckets are offered
    #[serde(default)]
    pub linked: LinkedBuckets,
}
