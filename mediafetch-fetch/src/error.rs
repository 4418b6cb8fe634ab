//! Extraction error types.

use std::time::Duration;
use thiserror::Error;

use mediafetch_core::FailureKind;

// ============================================================================
// Extract Error
// ============================================================================

/// Error returned by a single extractor attempt.
///
/// Every variant except [`ExtractError::Cancelled`] maps to a
/// [`FailureKind`] through [`ExtractError::kind`].
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The upstream throttled the request.
    #[error(
        "Rate limited{}: {detail}",
        .retry_after.map_or_else(String::new, |s| format!(" (retry after {s}s)"))
    )]
    RateLimited {
        /// Seconds to wait before retrying, if the upstream said.
        retry_after: Option<u64>,
        /// Diagnostic text.
        detail: String,
    },

    /// Bot detection, captcha, or an explicit refusal.
    #[error("Blocked: {0}")]
    Blocked(String),

    /// The attempt ran out of time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The media does not exist or is not accessible.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Retryable failure.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Permanent failure; no other extractor will do better.
    #[error("Fatal: {0}")]
    Fatal(String),

    /// The attempt observed cancellation and stopped.
    #[error("Cancelled")]
    Cancelled,

    /// Subprocess error.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Headless browser error.
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl ExtractError {
    /// Returns the failure classification, or `None` for cancellation.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::RateLimited { .. } => Some(FailureKind::RateLimited),
            Self::Blocked(_) => Some(FailureKind::Blocked),
            Self::Timeout(_) => Some(FailureKind::Timeout),
            Self::NotFound(_) => Some(FailureKind::NotFound),
            Self::Transient(_) => Some(FailureKind::Transient),
            Self::Fatal(_) => Some(FailureKind::Fatal),
            Self::Cancelled => None,
            Self::Process(e) => e.kind(),
            Self::Http(e) => Some(e.kind()),
            Self::Browser(e) => Some(e.kind()),
        }
    }

    /// Returns true if this error means the attempt was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.kind().is_none()
    }
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command timed out and was killed.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Command was cancelled and killed.
    #[error("Command cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Timeout(_) => Some(FailureKind::Timeout),
            Self::Cancelled => None,
            Self::NotFound(_) | Self::Io(_) => Some(FailureKind::Transient),
        }
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The proxy address could not be used.
    #[error("Invalid proxy {0}")]
    InvalidProxy(String),
}

impl HttpError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Request(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Request(_) | Self::InvalidProxy(_) => FailureKind::Transient,
            Self::InvalidUrl(_) => FailureKind::Fatal,
        }
    }
}

// ============================================================================
// Browser Error
// ============================================================================

/// Error type for headless browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The browser could not be started.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// Page navigation failed.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// An element the recipe needs was not found.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The result selector did not appear in time.
    #[error("Timed out waiting for {0}")]
    SelectorTimeout(String),

    /// DevTools protocol error.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Launch(_)
            | Self::Navigation(_)
            | Self::ElementNotFound(_)
            | Self::SelectorTimeout(_)
            | Self::Protocol(_) => FailureKind::Transient,
        }
    }
}

// ============================================================================
// Resolve Error
// ============================================================================

/// Error returned by a strategy chain once it gives up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The chain has no extractors configured.
    #[error("No extractors configured")]
    NoExtractors,

    /// The job was cancelled while the chain was running.
    #[error("Cancelled")]
    Cancelled,

    /// The job deadline passed.
    #[error("Job deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Every attempt failed, or one failed fatally.
    #[error("{kind}: {detail}")]
    Failed {
        /// Kind of the most recent informative failure.
        kind: FailureKind,
        /// Diagnostic text of that failure.
        detail: String,
    },
}

impl ResolveError {
    /// Returns the failure classification, or `None` for cancellation.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::NoExtractors => Some(FailureKind::Fatal),
            Self::Cancelled => None,
            Self::DeadlineExceeded(_) => Some(FailureKind::Timeout),
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_kinds() {
        let rl = ExtractError::RateLimited {
            retry_after: Some(30),
            detail: "HTTP 429".to_string(),
        };
        assert_eq!(rl.kind(), Some(FailureKind::RateLimited));
        assert!(rl.to_string().contains("retry after 30s"));

        assert_eq!(
            ExtractError::Process(ProcessError::Timeout(Duration::from_secs(1))).kind(),
            Some(FailureKind::Timeout)
        );
        assert!(ExtractError::Process(ProcessError::Cancelled).is_cancelled());
        assert_eq!(
            ExtractError::Browser(BrowserError::SelectorTimeout("a.dl".to_string())).kind(),
            Some(FailureKind::Transient)
        );
        assert_eq!(
            ExtractError::Http(HttpError::InvalidUrl("x".to_string())).kind(),
            Some(FailureKind::Fatal)
        );
    }

    #[test]
    fn test_resolve_error_kinds() {
        assert_eq!(ResolveError::NoExtractors.kind(), Some(FailureKind::Fatal));
        assert_eq!(ResolveError::Cancelled.kind(), None);
        assert_eq!(
            ResolveError::DeadlineExceeded(Duration::from_secs(5)).kind(),
            Some(FailureKind::Timeout)
        );
    }
}
