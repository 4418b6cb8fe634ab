//! Extractor trait and types.
//!
//! An extractor is one way of turning a platform URL into playable media:
//! a command-line tool, a headless browser driving a mirror site, or a
//! remote extraction service. Platforms hold an ordered list of extractors
//! that the [`StrategyChain`](crate::chain::StrategyChain) tries in turn.

use async_trait::async_trait;
use mediafetch_core::{ExtractorKind, Platform, Quality};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::context::ExtractContext;
use crate::error::ExtractError;

// ============================================================================
// Request & Scope
// ============================================================================

/// What to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Source URL as submitted.
    pub url: String,
    /// Classified platform.
    pub platform: Platform,
    /// Requested quality.
    pub quality: Quality,
}

impl ExtractRequest {
    /// Creates a new request.
    pub fn new(url: impl Into<String>, platform: Platform, quality: Quality) -> Self {
        Self {
            url: url.into(),
            platform,
            quality,
        }
    }
}

/// Per-attempt resources handed to an extractor.
#[derive(Debug, Clone)]
pub struct AttemptScope {
    /// Proxy to route through; `None` means direct.
    pub proxy: Option<String>,
    /// Fires when the attempt must stop (timeout or job cancellation).
    pub cancel: CancellationToken,
    /// Time budget for this attempt.
    pub timeout: Duration,
}

impl AttemptScope {
    /// Creates a scope with no proxy.
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            proxy: None,
            cancel,
            timeout,
        }
    }

    /// Sets the proxy.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }
}

// ============================================================================
// Extraction Result
// ============================================================================

/// Media produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedMedia {
    /// Direct media URL.
    RemoteUrl(String),
    /// File written to local disk.
    LocalFile(PathBuf),
}

/// A successful extraction and who produced it.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The produced media.
    pub media: ExtractedMedia,
    /// Extractor that succeeded.
    pub extractor_id: String,
    /// Mechanism used.
    pub kind: ExtractorKind,
}

// ============================================================================
// Extractor Trait
// ============================================================================

/// One way of extracting media for a platform.
///
/// ## Implementing an Extractor
///
/// ```ignore
/// struct EchoExtractor;
///
/// #[async_trait]
/// impl Extractor for EchoExtractor {
///     fn id(&self) -> &str {
///         "remote.echo"
///     }
///
///     fn kind(&self) -> ExtractorKind {
///         ExtractorKind::RemoteApi
///     }
///
///     async fn is_available(&self, _ctx: &ExtractContext) -> bool {
///         true
///     }
///
///     async fn extract(
///         &self,
///         request: &ExtractRequest,
///         _scope: &AttemptScope,
///         _ctx: &ExtractContext,
///     ) -> Result<ExtractedMedia, ExtractError> {
///         Ok(ExtractedMedia::RemoteUrl(request.url.clone()))
///     }
/// }
/// ```
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Unique identifier (e.g. `native.ytdlp`, `browser.ssstik`).
    ///
    /// Format: `{mechanism}.{name}`
    fn id(&self) -> &str;

    /// The mechanism this extractor uses.
    fn kind(&self) -> ExtractorKind;

    /// Whether attempts should be routed through the proxy pool.
    fn uses_proxy(&self) -> bool {
        true
    }

    /// Quick, local check whether this extractor can run at all
    /// (binary installed, endpoint configured, browser present).
    async fn is_available(&self, ctx: &ExtractContext) -> bool;

    /// Attempts extraction.
    ///
    /// Implementations must stop promptly once `scope.cancel` fires and
    /// must not leave child processes or browsers behind.
    async fn extract(
        &self,
        request: &ExtractRequest,
        scope: &AttemptScope,
        ctx: &ExtractContext,
    ) -> Result<ExtractedMedia, ExtractError>;
}
