//! Shared browser resource management
//!
//! This module owns the one Chrome/Chromium instance all fetches go through.
//! The handle is an explicitly owned resource: the executor asks it for a
//! fresh page per fetch, and a disconnected browser is relaunched under a
//! guarded check instead of failing the crawl.

mod executor;
mod extract;

pub use executor::BrowserExecutor;

use crate::config::BrowserSettings;
use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Well-known Chrome/Chromium install locations
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/opt/google/chrome/google-chrome",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// A launched (or remotely connected) browser plus its liveness flag
struct LiveBrowser {
    browser: Browser,
    alive: Arc<AtomicBool>,
}

/// Owned handle to the shared browser resource
///
/// All access goes through [`BrowserHandle::page`], which relaunches the
/// browser when the CDP connection has died. Only the fetch executor holds
/// this handle.
pub struct BrowserHandle {
    settings: BrowserSettings,
    inner: Mutex<Option<LiveBrowser>>,
}

impl BrowserHandle {
    /// Creates a handle; the browser itself is launched lazily
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(None),
        }
    }

    /// Ensures a live browser exists, relaunching a dead one
    pub async fn ensure(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_locked(&mut inner).await
    }

    /// Opens a fresh page on the live browser
    ///
    /// A failure to open the page marks the browser dead so the next call
    /// relaunches it.
    pub async fn page(&self) -> Result<Page> {
        let mut inner = self.inner.lock().await;
        self.ensure_locked(&mut inner).await?;

        let Some(live) = inner.as_mut() else {
            return Err(anyhow!("browser failed to initialize"));
        };

        match live.browser.new_page("about:blank").await {
            Ok(page) => Ok(page),
            Err(e) => {
                // The session died between the liveness check and now
                *inner = None;
                Err(e).context("Failed to open a new page")
            }
        }
    }

    /// Closes the browser, if one is running
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut live) = inner.take() {
            tracing::info!("Closing browser");
            if let Err(e) = live.browser.close().await {
                tracing::debug!("Browser close failed: {}", e);
            }
        }
    }

    async fn ensure_locked(&self, inner: &mut Option<LiveBrowser>) -> Result<()> {
        if let Some(live) = inner.as_ref() {
            if live.alive.load(Ordering::SeqCst) {
                return Ok(());
            }
            tracing::warn!("Browser connection lost; relaunching");
            *inner = None;
        }

        *inner = Some(self.launch().await?);
        Ok(())
    }

    async fn launch(&self) -> Result<LiveBrowser> {
        if let Some(remote_url) = &self.settings.remote_url {
            return self.connect_remote(remote_url).await;
        }

        let executable = find_browser_executable(&self.settings)?;
        tracing::info!(
            "Launching browser at {} (headless={})",
            executable.display(),
            self.settings.headless
        );

        let mut builder = BrowserConfig::builder().chrome_executable(executable);

        if !self.settings.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");

        for arg in &self.settings.extra_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        Ok(spawn_handler(browser, handler))
    }

    /// Connects to an already-running Chrome via its debug endpoint
    async fn connect_remote(&self, url: &str) -> Result<LiveBrowser> {
        tracing::info!("Connecting to remote browser at {}", url);

        // The WebSocket URL must be discovered from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .get(&version_url)
            .send()
            .await
            .context("Failed to reach remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("No webSocketDebuggerUrl in version response"))?;

        let (browser, handler) = Browser::connect(ws_url)
            .await
            .context("Failed to connect to remote browser")?;

        Ok(spawn_handler(browser, handler))
    }
}

/// Spawns the CDP message pump and wires its termination to a liveness flag
fn spawn_handler(browser: Browser, mut handler: Handler) -> LiveBrowser {
    let alive = Arc::new(AtomicBool::new(true));
    let flag = alive.clone();

    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
        flag.store(false, Ordering::SeqCst);
        tracing::warn!("Browser disconnected");
    });

    LiveBrowser { browser, alive }
}

/// Finds a Chrome/Chromium executable
///
/// Checks the configured path first, then well-known install locations,
/// then `which`.
fn find_browser_executable(settings: &BrowserSettings) -> Result<PathBuf> {
    if let Some(configured) = &settings.executable_path {
        let path = PathBuf::from(configured);
        if path.exists() {
            return Ok(path);
        }
        return Err(anyhow!(
            "Configured browser executable does not exist: {}",
            configured
        ));
    }

    for candidate in CHROME_PATHS {
        let path = PathBuf::from(candidate);
        if path.exists() {
            tracing::debug!("Found browser at {}", path.display());
            return Ok(path);
        }
    }

    for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    tracing::debug!("Found browser in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow!(
        "Chrome/Chromium not found; install it or set browser.executable-path"
    ))
}
