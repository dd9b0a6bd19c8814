//! Browser-backed fetch executor
//!
//! Implements the fetch contract on top of the shared browser handle: one
//! disposable page per fetch, released on every exit path, with the
//! navigation bounded by a timeout and the HTTP status read from the CDP
//! network events.

use crate::browser::{extract, BrowserHandle};
use crate::config::BrowserSettings;
use crate::crawler::{ExtractedFields, FetchError, FetchExecutor};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EventResponseReceived, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::{FutureExt, StreamExt};
use std::time::Duration;

/// How long to wait for the document response event after navigation settles
const DOCUMENT_RESPONSE_GRACE: Duration = Duration::from_secs(2);

/// Fetch executor backed by a scripted browser
pub struct BrowserExecutor {
    handle: BrowserHandle,
    user_agent: String,
    navigation_timeout: Duration,
}

impl BrowserExecutor {
    /// Creates an executor over a lazily launched browser
    pub fn new(settings: BrowserSettings, navigation_timeout: Duration) -> Self {
        let user_agent = settings.user_agent.clone();
        Self {
            handle: BrowserHandle::new(settings),
            user_agent,
            navigation_timeout,
        }
    }

    /// Navigates and extracts on an already-open page
    ///
    /// Split out so the caller can close the page regardless of which exit
    /// path this takes.
    async fn fetch_on_page(&self, page: &Page, url: &str) -> Result<ExtractedFields, FetchError> {
        page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| classify_navigation_error(url, e))?;

        // Register before navigating so the document response is not missed
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| classify_navigation_error(url, e))?;

        tokio::time::timeout(self.navigation_timeout, page.goto(url))
            .await
            .map_err(|_| FetchError::NavigationTimeout(self.navigation_timeout))?
            .map_err(|e| classify_navigation_error(url, e))?;

        tokio::time::timeout(self.navigation_timeout, page.wait_for_navigation())
            .await
            .map_err(|_| FetchError::NavigationTimeout(self.navigation_timeout))?
            .map_err(|e| classify_navigation_error(url, e))?;

        let status = document_status(&mut responses)
            .await
            .ok_or_else(|| FetchError::NoResponse {
                url: url.to_string(),
            })?;

        match status {
            429 => return Err(FetchError::RateLimited { status }),
            504 => return Err(FetchError::GatewayTimeout { status }),
            _ => {}
        }

        // Evaluation can hang on pathological pages; bound it like navigation
        let evaluated = tokio::time::timeout(
            self.navigation_timeout,
            page.evaluate(extract::EXTRACT_SCRIPT),
        )
        .await
        .map_err(|_| FetchError::NavigationTimeout(self.navigation_timeout))?
        .map_err(classify_evaluation_error)?;

        evaluated
            .into_value()
            .map_err(|e| FetchError::Extraction(e.to_string()))
    }
}

#[async_trait]
impl FetchExecutor for BrowserExecutor {
    async fn fetch(&self, url: &str) -> Result<ExtractedFields, FetchError> {
        let page = self
            .handle
            .page()
            .await
            .map_err(|e| FetchError::ConnectionReset(format!("{:#}", e)))?;

        let result = self.fetch_on_page(&page, url).await;

        // The page must be released on every exit path
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }

        result
    }

    async fn prepare(&self) -> Result<(), FetchError> {
        self.handle
            .ensure()
            .await
            .map_err(|e| FetchError::ConnectionReset(format!("{:#}", e)))
    }

    async fn shutdown(&self) {
        self.handle.close().await;
    }
}

/// Reads the HTTP status of the document response
///
/// Redirect chains emit one response event per hop; the last document hop is
/// the one the page actually rendered. Events already relayed by the handler
/// are drained without waiting; only if none have arrived yet does this wait
/// out a short grace window.
async fn document_status(events: &mut EventStream<EventResponseReceived>) -> Option<u16> {
    let mut status = None;

    while let Some(Some(event)) = events.next().now_or_never() {
        if event.r#type == ResourceType::Document {
            status = Some(event.response.status as u16);
        }
    }
    if status.is_some() {
        return status;
    }

    tokio::time::timeout(DOCUMENT_RESPONSE_GRACE, async {
        while let Some(event) = events.next().await {
            if event.r#type == ResourceType::Document {
                return Some(event.response.status as u16);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Returns true if the error means the CDP channel itself failed
///
/// A channel failure is local infrastructure, not the target page, so it is
/// classified as transient.
fn is_channel_failure(err: &CdpError) -> bool {
    let message = err.to_string().to_lowercase();
    message.contains("closed")
        || message.contains("channel")
        || message.contains("websocket")
        || message.contains("broken pipe")
}

fn classify_navigation_error(url: &str, err: CdpError) -> FetchError {
    if is_channel_failure(&err) {
        FetchError::ConnectionReset(err.to_string())
    } else {
        tracing::debug!("Navigation to {} failed: {}", url, err);
        FetchError::NoResponse {
            url: url.to_string(),
        }
    }
}

fn classify_evaluation_error(err: CdpError) -> FetchError {
    if is_channel_failure(&err) {
        FetchError::ConnectionReset(err.to_string())
    } else {
        FetchError::Extraction(err.to_string())
    }
}
