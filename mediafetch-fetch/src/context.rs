//! Extraction context providing access to host APIs.
//!
//! The context is shared by every extractor and gives unified access to the
//! subprocess runner, HTTP client, and headless browser launcher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::host::{
    browser::{BrowserLauncher, ChromiumLauncher},
    http::HttpClient,
    process::ProcessRunner,
};

// ============================================================================
// Extract Settings
// ============================================================================

/// Settings shared by all extractors.
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Directory extractors write downloaded files to.
    pub output_dir: PathBuf,
    /// How long an interrupted attempt gets to clean up.
    pub cancel_grace: Duration,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("mediafetch"),
            cancel_grace: Duration::from_secs(5),
        }
    }
}

impl ExtractSettings {
    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the cancellation grace period.
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}

// ============================================================================
// Extract Context
// ============================================================================

/// Context provided to extractors, giving access to host APIs.
pub struct ExtractContext {
    /// HTTP client with per-proxy clients.
    pub http: Arc<HttpClient>,
    /// Process runner for command-line extractors.
    pub process: Arc<ProcessRunner>,
    /// Headless browser launcher.
    pub browser: Arc<dyn BrowserLauncher>,
    /// Shared settings.
    pub settings: ExtractSettings,
}

impl ExtractContext {
    /// Creates a context with default host API implementations.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> ExtractContextBuilder {
        ExtractContextBuilder::new()
    }

    /// Returns the directory extractors write to.
    pub fn output_dir(&self) -> &std::path::Path {
        &self.settings.output_dir
    }
}

impl Default for ExtractContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExtractContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Extract Context Builder
// ============================================================================

/// Builder for constructing an [`ExtractContext`].
#[derive(Default)]
pub struct ExtractContextBuilder {
    http: Option<Arc<HttpClient>>,
    process: Option<Arc<ProcessRunner>>,
    browser: Option<Arc<dyn BrowserLauncher>>,
    settings: ExtractSettings,
}

impl ExtractContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP client.
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the process runner.
    pub fn process(mut self, process: Arc<ProcessRunner>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets the browser launcher.
    pub fn browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Sets the settings.
    pub fn settings(mut self, settings: ExtractSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the output directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.output_dir = dir.into();
        self
    }

    /// Builds the context.
    pub fn build(self) -> ExtractContext {
        ExtractContext {
            http: self.http.unwrap_or_else(|| Arc::new(HttpClient::new())),
            process: self.process.unwrap_or_else(|| Arc::new(ProcessRunner::new())),
            browser: self
                .browser
                .unwrap_or_else(|| Arc::new(ChromiumLauncher::new())),
            settings: self.settings,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = ExtractContext::builder()
            .output_dir("/tmp/mf-test")
            .build();

        assert_eq!(ctx.output_dir(), std::path::Path::new("/tmp/mf-test"));
        assert_eq!(ctx.settings.cancel_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_settings_builders() {
        let settings = ExtractSettings::default()
            .with_output_dir("/data")
            .with_cancel_grace(Duration::from_millis(250));
        assert_eq!(settings.output_dir, PathBuf::from("/data"));
        assert_eq!(settings.cancel_grace, Duration::from_millis(250));
    }
}
