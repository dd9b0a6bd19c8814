//! Fetch executor contract
//!
//! This module defines the interface between the scheduler and whatever
//! performs the actual page fetch, together with the error taxonomy the
//! scheduler maps onto status transitions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Structured fields extracted from a fetched page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub download_links: Vec<String>,
}

/// Errors a fetch can surface to the scheduler
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no response received for {url}")]
    NoResponse { url: String },

    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("gateway timeout (HTTP {status})")]
    GatewayTimeout { status: u16 },

    #[error("browser connection reset: {0}")]
    ConnectionReset(String),

    #[error("navigation did not complete within {0:?}")]
    NavigationTimeout(Duration),

    #[error("field extraction failed: {0}")]
    Extraction(String),
}

impl FetchError {
    /// Returns true if this outcome signals site-wide throttling
    ///
    /// These outcomes requeue the item and additionally pause all further
    /// dispatches for the global cool-down.
    pub fn triggers_backoff(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::GatewayTimeout { .. })
    }

    /// Returns true if this outcome requeues the item instead of failing it
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::GatewayTimeout { .. } | Self::ConnectionReset(_)
        )
    }
}

/// The contract between the scheduler and the page fetcher
///
/// Implementations must release any page context they acquire on every exit
/// path, and must never leave the shared browser resource in a state that
/// blocks subsequent fetches.
#[async_trait]
pub trait FetchExecutor: Send + Sync {
    /// Navigates to one URL and extracts its fields
    async fn fetch(&self, url: &str) -> Result<ExtractedFields, FetchError>;

    /// Acquires or validates the shared fetch resource ahead of a crawl
    ///
    /// Called once from start(). A failure here is not fatal: the executor is
    /// expected to retry acquisition on the next fetch attempt.
    async fn prepare(&self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Releases the shared fetch resource
    ///
    /// Called from stop().
    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_classification() {
        assert!(FetchError::RateLimited { status: 429 }.triggers_backoff());
        assert!(FetchError::GatewayTimeout { status: 504 }.triggers_backoff());

        assert!(!FetchError::ConnectionReset("ws closed".to_string()).triggers_backoff());
        assert!(!FetchError::Extraction("bad payload".to_string()).triggers_backoff());
        assert!(!FetchError::NavigationTimeout(Duration::from_secs(60)).triggers_backoff());
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::RateLimited { status: 429 }.is_transient());
        assert!(FetchError::GatewayTimeout { status: 504 }.is_transient());
        assert!(FetchError::ConnectionReset("ws closed".to_string()).is_transient());

        assert!(!FetchError::Extraction("bad payload".to_string()).is_transient());
        assert!(!FetchError::NavigationTimeout(Duration::from_secs(60)).is_transient());
        assert!(!FetchError::NoResponse {
            url: "https://example.com/".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_extracted_fields_deserializes_sparse_payload() {
        // The extraction script may omit arrays on unusual pages
        let fields: ExtractedFields = serde_json::from_str(r#"{"title": "Only a title"}"#).unwrap();
        assert_eq!(fields.title, "Only a title");
        assert!(fields.description.is_empty());
        assert!(fields.tags.is_empty());
        assert!(fields.download_links.is_empty());
    }
}
