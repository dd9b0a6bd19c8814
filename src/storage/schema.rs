//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the ModelCache database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per known URL
CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    status TEXT NOT NULL DEFAULT 'queued',
    title TEXT,
    description TEXT,
    tags TEXT,
    images TEXT,
    download_links TEXT,
    scraped_at TEXT,
    last_error TEXT,
    added_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
CREATE INDEX IF NOT EXISTS idx_pages_added_at ON pages(added_at);

-- Staging area for sitemap ingestion; never read by the scheduler
CREATE TABLE IF NOT EXISTS import_queue (
    url TEXT PRIMARY KEY,
    added_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
