//! Headless browser sessions for mirror-site automation.
//!
//! [`BrowserLauncher`] and [`BrowserSession`] are the seam extractors program
//! against; [`ChromiumLauncher`] drives a real Chromium over the DevTools
//! protocol. Sessions must be closed by the caller on every exit path;
//! dropping one without closing still kills the browser process.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::error::BrowserError;

/// Executable names probed when no browser path is configured.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

// ============================================================================
// Value Source
// ============================================================================

/// Which part of a matched element holds the wanted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// The named attribute (e.g. `href`, `src`).
    Attribute(String),
    /// The element's rendered text.
    Text,
}

// ============================================================================
// Launch Options
// ============================================================================

/// Per-session browser options.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Proxy the browser routes through.
    pub proxy: Option<String>,
    /// DevTools request timeout.
    pub request_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Quick check whether a browser can be launched at all.
    fn is_available(&self) -> bool;

    /// Launches a fresh browser with one blank page.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One browser process with a single page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigates the page and waits for it to load.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Focuses the element matching `selector` and types `value`.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Clicks the element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<(), BrowserError>;

    /// Reads a value from the first element matching `selector`.
    ///
    /// Returns `Ok(None)` while the element is absent or has no such value.
    async fn query(
        &mut self,
        selector: &str,
        source: &ValueSource,
    ) -> Result<Option<String>, BrowserError>;

    /// Returns the page HTML.
    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Shuts the browser down. Safe to call more than once.
    async fn close(&mut self);
}

// ============================================================================
// Chromium
// ============================================================================

/// Launches headless Chromium via the DevTools protocol.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    /// Creates a launcher that probes PATH for a Chromium build.
    pub fn new() -> Self {
        Self { executable: None }
    }

    /// Uses an explicit browser executable.
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    fn resolve_executable(&self) -> Option<PathBuf> {
        match &self.executable {
            Some(path) => which::which(path).ok(),
            None => BROWSER_CANDIDATES
                .iter()
                .find_map(|name| which::which(name).ok()),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    fn is_available(&self) -> bool {
        self.resolve_executable().is_some()
    }

    #[instrument(skip(self, options), fields(proxied = options.proxy.is_some()))]
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let executable = self
            .resolve_executable()
            .ok_or_else(|| BrowserError::Launch("no Chromium executable found".to_string()))?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .no_sandbox()
            .request_timeout(options.request_timeout)
            .args([
                "--disable-blink-features=AutomationControlled",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--disable-extensions",
                "--no-first-run",
            ]);
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let mut session = ChromiumSession {
            browser,
            page: None,
            handler,
            closed: false,
        };
        match session.browser.new_page("about:blank").await {
            Ok(page) => session.page = Some(page),
            Err(e) => {
                session.close().await;
                return Err(BrowserError::Launch(format!("failed to open page: {e}")));
            }
        }

        info!("Browser launched");
        Ok(Box::new(session))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::Protocol("session is closed".to_string()))
    }
}

fn protocol(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{selector}: {e}")))?;
        element.click().await.map_err(protocol)?;
        element.type_str(value).await.map_err(protocol)?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{selector}: {e}")))?;
        element.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn query(
        &mut self,
        selector: &str,
        source: &ValueSource,
    ) -> Result<Option<String>, BrowserError> {
        let Ok(element) = self.page()?.find_element(selector).await else {
            return Ok(None);
        };
        let value = match source {
            ValueSource::Attribute(name) => element.attribute(name.as_str()).await,
            ValueSource::Text => element.inner_text().await,
        };
        Ok(value.map_err(protocol)?.filter(|v| !v.trim().is_empty()))
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page()?.content().await.map_err(protocol)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.page = None;

        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "Graceful browser close failed, killing");
            if let Some(Err(e)) = self.browser.kill().await {
                debug!(error = %e, "Failed to kill browser");
            }
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "Failed to reap browser");
        }
        self.handler.abort();
        debug!("Browser closed");
    }
}

// ============================================================================
// Tests
// ============================================================================
