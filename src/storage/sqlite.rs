//! SQLite work store implementation
//!
//! This module provides a SQLite-based implementation of the WorkStore trait.
//! All status transitions are conditional updates keyed on the expected
//! current status, so only one writer can ever advance a row per attempt.

use crate::crawler::ExtractedFields;
use crate::state::ItemState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, WorkStore};
use crate::storage::{Progress, WorkItem};
use crate::ModelCacheError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite work store backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(ModelCacheError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, ModelCacheError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self, ModelCacheError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_item(row: &Row<'_>) -> rusqlite::Result<WorkItem> {
        Ok(WorkItem {
            url: row.get(0)?,
            status: ItemState::from_db_string(&row.get::<_, String>(1)?)
                .unwrap_or(ItemState::Failed),
            title: row.get(2)?,
            description: row.get(3)?,
            tags: parse_json_list(row.get::<_, Option<String>>(4)?),
            images: parse_json_list(row.get::<_, Option<String>>(5)?),
            download_links: parse_json_list(row.get::<_, Option<String>>(6)?),
            scraped_at: row.get(7)?,
            last_error: row.get(8)?,
            added_at: row.get(9)?,
        })
    }
}

const ITEM_COLUMNS: &str = "url, status, title, description, tags, images, download_links,
     scraped_at, last_error, added_at";

/// Parses a JSON array column, treating NULL or malformed content as empty
fn parse_json_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn to_json_list(values: &[String]) -> StorageResult<String> {
    serde_json::to_string(values).map_err(|e| StorageError::Serialization(e.to_string()))
}

impl WorkStore for SqliteStore {
    // ===== Population =====

    fn insert_url(&mut self, url: &str) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO pages (url, status, added_at) VALUES (?1, ?2, ?3)",
            params![url, ItemState::Queued.to_db_string(), now],
        )?;
        Ok(changed == 1)
    }

    fn get_item(&self, url: &str) -> StorageResult<Option<WorkItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE url = ?1",
            ITEM_COLUMNS
        ))?;

        let item = stmt
            .query_row(params![url], Self::row_to_item)
            .optional()?;

        Ok(item)
    }

    fn delete_one(&mut self, url: &str) -> StorageResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM pages WHERE url = ?1", params![url])?;
        Ok(changed == 1)
    }

    // ===== Scheduling =====

    fn claim_candidates(&self, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM pages WHERE status = ?1 ORDER BY added_at ASC, url ASC LIMIT ?2",
        )?;

        let urls = stmt
            .query_map(
                params![ItemState::Queued.to_db_string(), limit as i64],
                |row| row.get(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn mark_dispatched(&mut self, url: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1 WHERE url = ?2 AND status = ?3",
            params![
                ItemState::Dispatched.to_db_string(),
                url,
                ItemState::Queued.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn mark_in_progress(&mut self, url: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1 WHERE url = ?2 AND status = ?3",
            params![
                ItemState::InProgress.to_db_string(),
                url,
                ItemState::Dispatched.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn record_success(&mut self, url: &str, fields: &ExtractedFields) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1, title = ?2, description = ?3, tags = ?4,
             images = ?5, download_links = ?6, scraped_at = ?7, last_error = NULL
             WHERE url = ?8 AND status = ?9",
            params![
                ItemState::Done.to_db_string(),
                fields.title,
                fields.description,
                to_json_list(&fields.tags)?,
                to_json_list(&fields.images)?,
                to_json_list(&fields.download_links)?,
                now,
                url,
                ItemState::InProgress.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn record_failure(&mut self, url: &str, error: &str) -> StorageResult<bool> {
        // Fields from an earlier successful scrape are deliberately not touched
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1, last_error = ?2 WHERE url = ?3 AND status = ?4",
            params![
                ItemState::Failed.to_db_string(),
                error,
                url,
                ItemState::InProgress.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn requeue_from_flight(&mut self, url: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1 WHERE url = ?2 AND status IN (?3, ?4)",
            params![
                ItemState::Queued.to_db_string(),
                url,
                ItemState::Dispatched.to_db_string(),
                ItemState::InProgress.to_db_string()
            ],
        )?;
        Ok(changed == 1)
    }

    fn requeue_in_flight(&mut self) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1 WHERE status IN (?2, ?3)",
            params![
                ItemState::Queued.to_db_string(),
                ItemState::Dispatched.to_db_string(),
                ItemState::InProgress.to_db_string()
            ],
        )?;
        Ok(changed)
    }

    // ===== Operator maintenance =====

    fn requeue_all(&mut self) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1, last_error = NULL",
            params![ItemState::Queued.to_db_string()],
        )?;
        Ok(changed)
    }

    fn requeue_failed(&mut self) -> StorageResult<usize> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1, last_error = NULL WHERE status = ?2",
            params![
                ItemState::Queued.to_db_string(),
                ItemState::Failed.to_db_string()
            ],
        )?;
        Ok(changed)
    }

    fn requeue_one(&mut self, url: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1, last_error = NULL WHERE url = ?2",
            params![ItemState::Queued.to_db_string(), url],
        )?;
        Ok(changed == 1)
    }

    // ===== Aggregates =====

    fn progress(&self) -> StorageResult<Progress> {
        let progress = self.conn.query_row(
            "SELECT
                COUNT(*),
                SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'queued' THEN 1 ELSE 0 END),
                SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END)
             FROM pages",
            [],
            |row| {
                Ok(Progress {
                    total: row.get::<_, i64>(0)? as u64,
                    done: row.get::<_, Option<i64>>(1)?.unwrap_or(0) as u64,
                    queued: row.get::<_, Option<i64>>(2)?.unwrap_or(0) as u64,
                    failed: row.get::<_, Option<i64>>(3)?.unwrap_or(0) as u64,
                })
            },
        )?;

        Ok(progress)
    }

    fn count_by_status(&self, status: ItemState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_in_flight(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status IN (?1, ?2)",
            params![
                ItemState::Dispatched.to_db_string(),
                ItemState::InProgress.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn search_done(&self, query: &str, limit: usize) -> StorageResult<Vec<WorkItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages
             WHERE status = ?1 AND (title LIKE ?2 OR tags LIKE ?2)
             ORDER BY scraped_at DESC LIMIT ?3",
            ITEM_COLUMNS
        ))?;

        let pattern = format!("%{}%", query);
        let items = stmt
            .query_map(
                params![ItemState::Done.to_db_string(), pattern, limit as i64],
                Self::row_to_item,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(items)
    }

    // ===== Sitemap import staging =====

    fn stage_import(&mut self, url: &str) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO import_queue (url, added_at) VALUES (?1, ?2)",
            params![url, now],
        )?;
        Ok(changed == 1)
    }

    fn staged_imports(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM import_queue ORDER BY added_at ASC, url ASC")?;

        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(urls)
    }

    fn drain_imports(&mut self) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut added = 0;

        {
            let mut select = tx.prepare("SELECT url FROM import_queue ORDER BY added_at ASC")?;
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO pages (url, status, added_at) VALUES (?1, ?2, ?3)",
            )?;

            let urls = select
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            for url in urls {
                let now = Utc::now().to_rfc3339();
                added += insert.execute(params![
                    url,
                    ItemState::Queued.to_db_string(),
                    now
                ])?;
            }
        }

        tx.execute("DELETE FROM import_queue", [])?;
        tx.commit()?;

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fields() -> ExtractedFields {
        ExtractedFields {
            title: "Sample Model".to_string(),
            description: "A sample description".to_string(),
            tags: vec!["sci-fi".to_string(), "props".to_string()],
            images: vec!["https://cdn.example.com/a.jpg".to_string()],
            download_links: vec!["https://example.com/download/1".to_string()],
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStore::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        assert!(store.insert_url("https://example.com/model/1").unwrap());
        assert!(!store.insert_url("https://example.com/model/1").unwrap());

        let progress = store.progress().unwrap();
        assert_eq!(progress.total, 1);
        assert_eq!(progress.queued, 1);
    }

    #[test]
    fn test_claim_candidates_fifo_order() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        // Inserted b before a; insertion order wins over lexical order
        store.insert_url("https://b.com/").unwrap();
        store.insert_url("https://a.com/").unwrap();
        store.insert_url("https://c.com/").unwrap();

        let candidates = store.claim_candidates(50).unwrap();
        assert_eq!(
            candidates,
            vec!["https://b.com/", "https://a.com/", "https://c.com/"]
        );
    }

    #[test]
    fn test_claim_candidates_skips_non_queued() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        store.insert_url("https://example.com/1").unwrap();
        store.insert_url("https://example.com/2").unwrap();
        store.mark_dispatched("https://example.com/1").unwrap();

        let candidates = store.claim_candidates(50).unwrap();
        assert_eq!(candidates, vec!["https://example.com/2"]);
    }

    #[test]
    fn test_dispatch_requires_queued() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.insert_url("https://example.com/1").unwrap();

        assert!(store.mark_dispatched("https://example.com/1").unwrap());
        // Second claim must lose: the row is no longer queued
        assert!(!store.mark_dispatched("https://example.com/1").unwrap());
    }

    #[test]
    fn test_full_success_cycle() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let url = "https://example.com/model/1";
        store.insert_url(url).unwrap();

        assert!(store.mark_dispatched(url).unwrap());
        assert!(store.mark_in_progress(url).unwrap());
        assert!(store.record_success(url, &sample_fields()).unwrap());

        let item = store.get_item(url).unwrap().unwrap();
        assert_eq!(item.status, ItemState::Done);
        assert_eq!(item.title.as_deref(), Some("Sample Model"));
        assert_eq!(item.tags, vec!["sci-fi", "props"]);
        assert!(item.scraped_at.is_some());
        assert!(item.last_error.is_none());
    }

    #[test]
    fn test_record_failure_sets_error() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let url = "https://example.com/model/1";
        store.insert_url(url).unwrap();
        store.mark_dispatched(url).unwrap();
        store.mark_in_progress(url).unwrap();

        assert!(store.record_failure(url, "extraction failed").unwrap());

        let item = store.get_item(url).unwrap().unwrap();
        assert_eq!(item.status, ItemState::Failed);
        assert_eq!(item.last_error.as_deref(), Some("extraction failed"));
    }

    #[test]
    fn test_failure_preserves_prior_fields() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let url = "https://example.com/model/1";
        store.insert_url(url).unwrap();

        // First scrape succeeds
        store.mark_dispatched(url).unwrap();
        store.mark_in_progress(url).unwrap();
        store.record_success(url, &sample_fields()).unwrap();

        // Operator requeues, second scrape fails
        store.requeue_one(url).unwrap();
        store.mark_dispatched(url).unwrap();
        store.mark_in_progress(url).unwrap();
        store.record_failure(url, "navigation timeout").unwrap();

        let item = store.get_item(url).unwrap().unwrap();
        assert_eq!(item.status, ItemState::Failed);
        assert_eq!(item.title.as_deref(), Some("Sample Model"));
        assert_eq!(item.tags, vec!["sci-fi", "props"]);
        assert_eq!(item.last_error.as_deref(), Some("navigation timeout"));
    }

    #[test]
    fn test_stale_write_after_requeue_is_discarded() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let url = "https://example.com/model/1";
        store.insert_url(url).unwrap();
        store.mark_dispatched(url).unwrap();
        store.mark_in_progress(url).unwrap();

        // stop() reconciles the row before the fetch finishes
        assert_eq!(store.requeue_in_flight().unwrap(), 1);

        // The late completion must not change anything
        assert!(!store.record_success(url, &sample_fields()).unwrap());
        assert!(!store.record_failure(url, "late error").unwrap());

        let item = store.get_item(url).unwrap().unwrap();
        assert_eq!(item.status, ItemState::Queued);
        assert!(item.last_error.is_none());
    }

    #[test]
    fn test_requeue_in_flight_covers_both_states() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.insert_url("https://example.com/1").unwrap();
        store.insert_url("https://example.com/2").unwrap();
        store.insert_url("https://example.com/3").unwrap();

        store.mark_dispatched("https://example.com/1").unwrap();
        store.mark_dispatched("https://example.com/2").unwrap();
        store.mark_in_progress("https://example.com/2").unwrap();

        assert_eq!(store.requeue_in_flight().unwrap(), 2);
        assert_eq!(store.count_in_flight().unwrap(), 0);
        assert_eq!(store.count_by_status(ItemState::Queued).unwrap(), 3);
    }

    #[test]
    fn test_requeue_failed_only() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        for url in ["https://example.com/1", "https://example.com/2"] {
            store.insert_url(url).unwrap();
            store.mark_dispatched(url).unwrap();
            store.mark_in_progress(url).unwrap();
        }
        store
            .record_success("https://example.com/1", &sample_fields())
            .unwrap();
        store
            .record_failure("https://example.com/2", "boom")
            .unwrap();

        assert_eq!(store.requeue_failed().unwrap(), 1);

        let done = store.get_item("https://example.com/1").unwrap().unwrap();
        assert_eq!(done.status, ItemState::Done);

        let requeued = store.get_item("https://example.com/2").unwrap().unwrap();
        assert_eq!(requeued.status, ItemState::Queued);
        assert!(requeued.last_error.is_none());
    }

    #[test]
    fn test_progress_aggregate() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        for i in 0..4 {
            store.insert_url(&format!("https://example.com/{}", i)).unwrap();
        }
        store.mark_dispatched("https://example.com/0").unwrap();
        store.mark_in_progress("https://example.com/0").unwrap();
        store
            .record_success("https://example.com/0", &sample_fields())
            .unwrap();
        store.mark_dispatched("https://example.com/1").unwrap();
        store.mark_in_progress("https://example.com/1").unwrap();
        store
            .record_failure("https://example.com/1", "boom")
            .unwrap();

        let progress = store.progress().unwrap();
        assert_eq!(progress.total, 4);
        assert_eq!(progress.done, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.queued, 2);
    }

    #[test]
    fn test_progress_on_empty_store() {
        let store = SqliteStore::new_in_memory().unwrap();
        let progress = store.progress().unwrap();
        assert_eq!(
            progress,
            Progress {
                total: 0,
                done: 0,
                queued: 0,
                failed: 0
            }
        );
    }

    #[test]
    fn test_search_done_matches_title_and_tags() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        for (url, title, tag) in [
            ("https://example.com/1", "Starship Hull", "sci-fi"),
            ("https://example.com/2", "Oak Table", "furniture"),
        ] {
            store.insert_url(url).unwrap();
            store.mark_dispatched(url).unwrap();
            store.mark_in_progress(url).unwrap();
            let fields = ExtractedFields {
                title: title.to_string(),
                tags: vec![tag.to_string()],
                ..Default::default()
            };
            store.record_success(url, &fields).unwrap();
        }

        let by_title = store.search_done("Starship", 50).unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].url, "https://example.com/1");

        let by_tag = store.search_done("furniture", 50).unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].url, "https://example.com/2");

        // Queued items never show up in search results
        store.insert_url("https://example.com/3").unwrap();
        let all = store.search_done("", 50).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_delete_one() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.insert_url("https://example.com/1").unwrap();

        assert!(store.delete_one("https://example.com/1").unwrap());
        assert!(!store.delete_one("https://example.com/1").unwrap());
        assert_eq!(store.progress().unwrap().total, 0);
    }

    #[test]
    fn test_import_staging_drains_idempotently() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        // One URL already known to the work table
        store.insert_url("https://example.com/known").unwrap();

        store.stage_import("https://example.com/known").unwrap();
        store.stage_import("https://example.com/new").unwrap();
        assert_eq!(store.staged_imports().unwrap().len(), 2);

        let added = store.drain_imports().unwrap();
        assert_eq!(added, 1);
        assert!(store.staged_imports().unwrap().is_empty());
        assert_eq!(store.progress().unwrap().total, 2);

        // Draining again is a no-op
        assert_eq!(store.drain_imports().unwrap(), 0);
    }
}
