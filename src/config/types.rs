use crate::crawler::SchedulerTiming;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for ModelCache
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub browser: BrowserSettings,

    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Scheduler pacing configuration
///
/// The politeness mode picked at start time decides concurrency and dispatch
/// interval; these knobs cover everything else the poll loop runs under.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum queued items picked up per store scan
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Sleep between scans when the queue is empty (seconds)
    #[serde(rename = "idle-interval-secs", default = "default_idle_interval_secs")]
    pub idle_interval_secs: u64,

    /// Sleep after dispatching a batch (seconds)
    #[serde(rename = "rescan-interval-secs", default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,

    /// Global dispatch pause after a rate-limit response (seconds)
    #[serde(rename = "backoff-secs", default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Upper bound on a single page navigation (seconds)
    #[serde(
        rename = "navigation-timeout-secs",
        default = "default_navigation_timeout_secs"
    )]
    pub navigation_timeout_secs: u64,
}

impl CrawlerConfig {
    /// Converts the configured intervals into scheduler timing
    pub fn scheduler_timing(&self) -> SchedulerTiming {
        SchedulerTiming {
            batch_size: self.batch_size,
            idle_interval: Duration::from_secs(self.idle_interval_secs),
            rescan_interval: Duration::from_secs(self.rescan_interval_secs),
            backoff: Duration::from_secs(self.backoff_secs),
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            idle_interval_secs: default_idle_interval_secs(),
            rescan_interval_secs: default_rescan_interval_secs(),
            backoff_secs: default_backoff_secs(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
        }
    }
}

/// Browser resource configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// Explicit Chrome/Chromium binary; autodetected when unset
    #[serde(rename = "executable-path", default)]
    pub executable_path: Option<String>,

    /// Debug endpoint of an already-running Chrome (e.g. "http://127.0.0.1:9222")
    #[serde(rename = "remote-url", default)]
    pub remote_url: Option<String>,

    #[serde(default = "default_headless")]
    pub headless: bool,

    /// User agent presented to fetched pages
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Additional Chrome command-line arguments
    #[serde(rename = "extra-args", default)]
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable_path: None,
            remote_url: None,
            headless: default_headless(),
            user_agent: default_user_agent(),
            extra_args: Vec::new(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Control API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the control API binds to
    #[serde(rename = "listen-addr", default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_idle_interval_secs() -> u64 {
    5
}

fn default_rescan_interval_secs() -> u64 {
    10
}

fn default_backoff_secs() -> u64 {
    60
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}
