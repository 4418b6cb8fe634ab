//! Extraction failure classification.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Failure Kind
// ============================================================================

/// Why an extraction attempt failed.
///
/// The kind drives fallback policy in the strategy chain and proxy health
/// tracking, and is surfaced to clients as `failure.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The upstream throttled us (HTTP 429 or equivalent).
    RateLimited,
    /// The upstream refused us (bot detection, captcha, 403).
    Blocked,
    /// The attempt or job ran out of time.
    Timeout,
    /// The media does not exist, was removed, or is private.
    NotFound,
    /// A retryable failure with no more specific classification.
    Transient,
    /// A permanent failure; other extractors will not do better.
    Fatal,
}

impl FailureKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "RateLimited",
            Self::Blocked => "Blocked",
            Self::Timeout => "Timeout",
            Self::NotFound => "NotFound",
            Self::Transient => "Transient",
            Self::Fatal => "Fatal",
        }
    }

    /// Human-actionable message shown to clients.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RateLimited => "The platform is rate limiting requests. Please try again later.",
            Self::Blocked => {
                "The platform blocked the download (bot detection or captcha). Try again later."
            }
            Self::Timeout => "The download took too long and was stopped. Please try again.",
            Self::NotFound => "The video could not be found. It may be private or removed.",
            Self::Transient => "The download failed due to a temporary problem. Please try again.",
            Self::Fatal => "This video cannot be downloaded.",
        }
    }

    /// Returns true if this failure says something about the egress proxy.
    ///
    /// `NotFound` and `Fatal` are properties of the content, not the route.
    pub fn implicates_proxy(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Blocked | Self::Timeout | Self::Transient
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
