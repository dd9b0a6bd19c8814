//! ModelCache: a sitemap-driven page cache
//!
//! This crate crawls a fixed population of URLs discovered from a sitemap,
//! fetches each page through a scripted browser, extracts structured fields,
//! and persists them to SQLite. A control API lets an operator start and stop
//! the crawl, inspect progress, and recover failed items.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod server;
pub mod sitemap;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for ModelCache operations
#[derive(Debug, Error)]
pub enum ModelCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown crawl mode '{0}' (expected \"gentle\" or \"full\")")]
    InvalidMode(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Sitemap error: {0}")]
    Sitemap(#[from] sitemap::SitemapError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for ModelCache operations
pub type Result<T> = std::result::Result<T, ModelCacheError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlMode, CrawlSettings, ExtractedFields, FetchError, FetchExecutor, Scheduler};
pub use state::ItemState;
pub use storage::{Progress, SqliteStore, WorkItem, WorkStore};
