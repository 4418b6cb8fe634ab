//! Core error types for `MediaFetch`.

use thiserror::Error;

/// Error returned when a raw URL cannot be routed to a platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The input is not a parseable http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL is well formed but does not belong to a supported platform.
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),
}

impl ClassifyError {
    /// Wire code used by the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "InvalidURL",
            Self::UnsupportedUrl(_) => "UnsupportedURL",
        }
    }
}

/// Error returned when a quality hint cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid quality: {0:?} (expected best, audio, or a height such as 720p)")]
pub struct QualityError(pub String);
