use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Link cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Path to the SQLite database file backing the cache.
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Retention for resolved links in seconds. 0 disables expiry.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Entry time-to-live, or `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        if self.ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.ttl_secs))
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("stashlink.db")
}

fn default_ttl_secs() -> u64 {
    60 * 60 * 24
}

/// Acquisition pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Target page URL template; `{id}` is replaced with the item id.
    pub url_template: String,
    /// Command that drives the headless browser against the target URL.
    /// Receives the rendered URL as its final argument and prints the
    /// downloaded artifact path (or a direct URL) on stdout.
    pub automation_command: String,
    /// Extra arguments passed to the automation command before the URL.
    #[serde(default)]
    pub automation_args: Vec<String>,
    /// Maximum time the automation command may run, in milliseconds.
    #[serde(default = "default_automation_timeout_ms")]
    pub automation_timeout_ms: u64,
    /// Directory for artifacts produced before upload.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    /// rclone remote name holding durable storage.
    #[serde(default = "default_rclone_remote")]
    pub rclone_remote: String,
    /// Folder inside the remote where artifacts are stored.
    #[serde(default = "default_rclone_folder")]
    pub rclone_folder: String,
}

impl PipelineConfig {
    pub fn automation_timeout(&self) -> Duration {
        Duration::from_millis(self.automation_timeout_ms)
    }
}

fn default_automation_timeout_ms() -> u64 {
    15_000
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_rclone_remote() -> String {
    "mega".to_string()
}

fn default_rclone_folder() -> String {
    "stashlink_cache".to_string()
}

/// Fetch orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// How long a caller waits for an in-flight acquisition before giving up,
    /// in seconds. The acquisition itself keeps running.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl FetchConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

fn default_wait_timeout_secs() -> u64 {
    120
}

/// Sanitized config for API responses (remote wiring redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    pub pipeline: SanitizedPipelineConfig,
}

/// Sanitized pipeline config (command line hidden, destination summarized)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPipelineConfig {
    pub url_template: String,
    pub automation_configured: bool,
    pub automation_timeout_ms: u64,
    pub rclone_remote: String,
    pub rclone_folder: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            cache: config.cache.clone(),
            fetch: config.fetch.clone(),
            pipeline: SanitizedPipelineConfig {
                url_template: config.pipeline.url_template.clone(),
                automation_configured: !config.pipeline.automation_command.is_empty(),
                automation_timeout_ms: config.pipeline.automation_timeout_ms,
                rclone_remote: config.pipeline.rclone_remote.clone(),
                rclone_folder: config.pipeline.rclone_folder.clone(),
            },
        }
    }
}
