//! Store error types.

use std::time::Duration;

use thiserror::Error;

use mediafetch_core::{ClassifyError, JobId, QualityError};

// ============================================================================
// Store Error
// ============================================================================

/// Errors from configuration, persistence, and the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Artifact unknown, already released, or its file is gone.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if the error means "nothing there".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ArtifactNotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

// ============================================================================
// Submit Error
// ============================================================================

/// Synchronous rejection of a submission. No job is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The input is not a usable URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL belongs to no supported platform.
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// The quality hint is not recognised.
    #[error("{0}")]
    InvalidQuality(String),

    /// The client submitted too often.
    #[error("Too many submissions; retry after {}s", ceil_secs(.retry_after))]
    RateLimited {
        /// Time until the next submission is accepted.
        retry_after: Duration,
    },

    /// The coordinator is shutting down.
    #[error("Service is shutting down")]
    ShuttingDown,
}

impl SubmitError {
    /// Stable error code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "InvalidURL",
            Self::UnsupportedUrl(_) => "UnsupportedURL",
            Self::InvalidQuality(_) => "InvalidQuality",
            Self::RateLimited { .. } => "RateLimited",
            Self::ShuttingDown => "ShuttingDown",
        }
    }

    /// Whole seconds to wait, for `Retry-After`.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(ceil_secs(retry_after)),
            _ => None,
        }
    }
}

/// Rounds up to whole seconds, never below one.
fn ceil_secs(d: &Duration) -> u64 {
    (d.as_secs() + u64::from(d.subsec_nanos() > 0)).max(1)
}

impl From<ClassifyError> for SubmitError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::InvalidUrl(msg) => Self::InvalidUrl(msg),
            ClassifyError::UnsupportedUrl(msg) => Self::UnsupportedUrl(msg),
        }
    }
}

impl From<QualityError> for SubmitError {
    fn from(err: QualityError) -> Self {
        Self::InvalidQuality(err.to_string())
    }
}

// ============================================================================
// Coordinator Error
// ============================================================================

/// Errors from operations on existing jobs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// Unknown or evicted job.
    #[error("Job not found: {0}")]
    NotFound(JobId),
}
