//! Storage module for persisting crawl work
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Work item status persistence and conditional transitions
//! - Progress aggregation for the control surface
//! - Sitemap import staging

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{StorageError, StorageResult, WorkStore};

use crate::state::ItemState;
use crate::ModelCacheError;
use serde::Serialize;

use std::path::Path;

/// Initializes or opens a work store database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(ModelCacheError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStore, ModelCacheError> {
    SqliteStore::new(path)
}

/// Represents one URL's row in the work store
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub url: String,
    pub status: ItemState,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub images: Vec<String>,
    pub download_links: Vec<String>,
    pub scraped_at: Option<String>,
    pub last_error: Option<String>,
    pub added_at: String,
}

/// Point-in-time aggregate of the work store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: u64,
    pub done: u64,
    pub queued: u64,
    pub failed: u64,
}

