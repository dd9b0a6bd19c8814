//! Storage traits and error types
//!
//! This module defines the trait interface for the work store and
//! associated error types.

use crate::crawler::ExtractedFields;
use crate::state::ItemState;
use crate::storage::{Progress, WorkItem};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the durable work store
///
/// The store is the single source of truth for item status; every status
/// transition goes through it. Transition methods are conditional writes
/// (they require the expected current status) and report whether a row was
/// actually changed, so a stale writer can never clobber a newer state.
pub trait WorkStore {
    // ===== Population =====

    /// Inserts a URL with status `queued`
    ///
    /// Insertion is idempotent: re-adding an existing URL is a no-op.
    ///
    /// # Returns
    ///
    /// true if the URL was newly inserted, false if it already existed
    fn insert_url(&mut self, url: &str) -> StorageResult<bool>;

    /// Gets a work item by URL
    fn get_item(&self, url: &str) -> StorageResult<Option<WorkItem>>;

    /// Removes a work item entirely
    ///
    /// # Returns
    ///
    /// true if a row was deleted
    fn delete_one(&mut self, url: &str) -> StorageResult<bool>;

    // ===== Scheduling =====

    /// Selects up to `limit` queued URLs, oldest-inserted first
    ///
    /// Ties on insertion time are broken by lexical URL order so the scan
    /// order is stable and deterministic.
    fn claim_candidates(&self, limit: usize) -> StorageResult<Vec<String>>;

    /// Transitions a queued item to dispatched
    ///
    /// # Returns
    ///
    /// true if the item was claimed; false if it was no longer queued
    fn mark_dispatched(&mut self, url: &str) -> StorageResult<bool>;

    /// Transitions a dispatched item to in_progress
    fn mark_in_progress(&mut self, url: &str) -> StorageResult<bool>;

    /// Transitions an in_progress item to done, recording the extracted
    /// fields and the scrape timestamp, and clearing any previous error
    fn record_success(&mut self, url: &str, fields: &ExtractedFields) -> StorageResult<bool>;

    /// Transitions an in_progress item to failed with a diagnostic message
    ///
    /// Fields from a prior successful scrape are left untouched.
    fn record_failure(&mut self, url: &str, error: &str) -> StorageResult<bool>;

    /// Returns an in-flight (dispatched or in_progress) item to queued
    ///
    /// Used for transient fetch outcomes; records no error.
    fn requeue_from_flight(&mut self, url: &str) -> StorageResult<bool>;

    /// Returns every in-flight item to queued
    ///
    /// Called by stop() so no work is silently lost.
    ///
    /// # Returns
    ///
    /// The number of rows reconciled
    fn requeue_in_flight(&mut self) -> StorageResult<usize>;

    // ===== Operator maintenance =====

    /// Requeues every item and clears all recorded errors
    fn requeue_all(&mut self) -> StorageResult<usize>;

    /// Requeues only failed items, clearing their recorded errors
    fn requeue_failed(&mut self) -> StorageResult<usize>;

    /// Requeues a single item regardless of its current status
    fn requeue_one(&mut self, url: &str) -> StorageResult<bool>;

    // ===== Aggregates =====

    /// Returns the point-in-time progress aggregate
    fn progress(&self) -> StorageResult<Progress>;

    /// Counts items in a specific state
    fn count_by_status(&self, status: ItemState) -> StorageResult<u64>;

    /// Counts items currently occupying a concurrency slot
    fn count_in_flight(&self) -> StorageResult<u64>;

    /// Searches done items whose title or tags match the query
    fn search_done(&self, query: &str, limit: usize) -> StorageResult<Vec<WorkItem>>;

    // ===== Sitemap import staging =====

    /// Stages a URL for import
    fn stage_import(&mut self, url: &str) -> StorageResult<bool>;

    /// Lists all staged URLs
    fn staged_imports(&self) -> StorageResult<Vec<String>>;

    /// Moves every staged URL into the work table and clears the staging area
    ///
    /// # Returns
    ///
    /// The number of URLs newly added to the work table
    fn drain_imports(&mut self) -> StorageResult<usize>;
}
