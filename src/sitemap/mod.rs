//! Sitemap ingestion
//!
//! One-time import that turns a sitemap `urlset` file into queued work rows.
//! URLs are staged through the import queue first and then drained into the
//! work table with idempotent inserts, so re-importing the same sitemap never
//! duplicates or resets existing items. The scheduler never reads the staging
//! table.

use crate::storage::WorkStore;
use crate::ModelCacheError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Sitemap-specific errors
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Failed to read sitemap file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse sitemap XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document contains no <urlset> element")]
    NotAUrlset,
}

/// Outcome of a sitemap import
#[derive(Debug, Clone, Copy)]
pub struct ImportSummary {
    /// `<loc>` entries found in the document
    pub parsed: usize,

    /// Valid URLs staged for import
    pub staged: usize,

    /// URLs newly added to the work queue
    pub added: usize,
}

/// Extracts all `<loc>` values from a sitemap urlset document
///
/// # Arguments
///
/// * `xml` - The sitemap document content
///
/// # Returns
///
/// * `Ok(Vec<String>)` - The location entries, in document order
/// * `Err(SitemapError)` - Malformed XML or not a urlset
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, SitemapError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_loc = false;
    let mut saw_urlset = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.name().as_ref().ends_with(b"urlset") {
                    saw_urlset = true;
                } else if e.name().as_ref().ends_with(b"loc") {
                    in_loc = true;
                }
            }
            Event::End(e) => {
                if e.name().as_ref().ends_with(b"loc") {
                    in_loc = false;
                }
            }
            Event::Text(t) => {
                if in_loc {
                    locs.push(t.unescape()?.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_urlset {
        return Err(SitemapError::NotAUrlset);
    }

    Ok(locs)
}

/// Imports a sitemap file into the work store
///
/// Invalid URLs are skipped with a warning rather than failing the import.
///
/// # Arguments
///
/// * `store` - The work store to import into
/// * `path` - Path to the sitemap XML file
pub fn import_sitemap<S: WorkStore>(
    store: &mut S,
    path: &Path,
) -> Result<ImportSummary, ModelCacheError> {
    let xml = std::fs::read_to_string(path).map_err(SitemapError::Io)?;
    let locs = parse_sitemap(&xml)?;
    let parsed = locs.len();

    let mut staged = 0;
    for loc in &locs {
        match Url::parse(loc) {
            Ok(_) => {
                if store.stage_import(loc)? {
                    staged += 1;
                }
            }
            Err(e) => {
                tracing::warn!("Skipping invalid sitemap URL '{}': {}", loc, e);
            }
        }
    }

    let added = store.drain_imports()?;
    tracing::info!(
        "Sitemap import: {} entries parsed, {} staged, {} newly queued",
        parsed,
        staged,
        added
    );

    Ok(ImportSummary {
        parsed,
        staged,
        added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use std::io::Write;

    const SAMPLE_SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/model/alpha</loc>
    <lastmod>2024-01-15</lastmod>
  </url>
  <url>
    <loc>https://example.com/model/beta?id=2&amp;lang=en</loc>
  </url>
  <url>
    <loc>not a url</loc>
  </url>
</urlset>"#;

    #[test]
    fn test_parse_sitemap_extracts_locs() {
        let locs = parse_sitemap(SAMPLE_SITEMAP).unwrap();
        assert_eq!(
            locs,
            vec![
                "https://example.com/model/alpha",
                "https://example.com/model/beta?id=2&lang=en",
                "not a url",
            ]
        );
    }

    #[test]
    fn test_parse_rejects_non_urlset() {
        let result = parse_sitemap("<sitemapindex><sitemap><loc>x</loc></sitemap></sitemapindex>");
        assert!(matches!(result, Err(SitemapError::NotAUrlset)));
    }

    #[test]
    fn test_parse_empty_urlset() {
        let locs = parse_sitemap(
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"></urlset>"#,
        )
        .unwrap();
        assert!(locs.is_empty());
    }

    #[test]
    fn test_import_skips_invalid_and_is_idempotent() {
        let mut store = SqliteStore::new_in_memory().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_SITEMAP.as_bytes()).unwrap();
        file.flush().unwrap();

        let summary = import_sitemap(&mut store, file.path()).unwrap();
        assert_eq!(summary.parsed, 3);
        assert_eq!(summary.staged, 2);
        assert_eq!(summary.added, 2);

        // Importing the same file again adds nothing
        let summary = import_sitemap(&mut store, file.path()).unwrap();
        assert_eq!(summary.parsed, 3);
        assert_eq!(summary.added, 0);

        let progress = store.progress().unwrap();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.queued, 2);
    }
}
