//! Extraction attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::FailureKind;

// ============================================================================
// Extractor Kind
// ============================================================================

/// The mechanism an extractor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// External command-line extractor (yt-dlp compatible).
    NativeTool,
    /// Headless browser driving a mirror site.
    BrowserAutomation,
    /// Remote extraction service over HTTP.
    RemoteApi,
}

impl ExtractorKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NativeTool => "Native Tool",
            Self::BrowserAutomation => "Browser Automation",
            Self::RemoteApi => "Remote API",
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Attempt Record
// ============================================================================

/// Record of one extractor attempt within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// Extractor identifier (e.g. `native.ytdlp`, `browser.ssstik`).
    pub extractor: String,
    /// Extractor mechanism.
    pub kind: ExtractorKind,
    /// Proxy used for this attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// When the attempt started.
    pub started_at: DateTime<Utc>,
    /// When the attempt ended.
    pub ended_at: DateTime<Utc>,
    /// Failure classification; `None` on success or cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    /// Raw diagnostic text from the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Whether the attempt was interrupted by job cancellation.
    #[serde(default)]
    pub cancelled: bool,
}

impl AttemptRecord {
    /// Creates a successful attempt record.
    pub fn success(
        extractor: impl Into<String>,
        kind: ExtractorKind,
        proxy: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            extractor: extractor.into(),
            kind,
            proxy,
            started_at,
            ended_at: Utc::now(),
            failure_kind: None,
            detail: None,
            cancelled: false,
        }
    }

    /// Creates a failed attempt record.
    pub fn failure(
        extractor: impl Into<String>,
        kind: ExtractorKind,
        proxy: Option<String>,
        started_at: DateTime<Utc>,
        failure_kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            extractor: extractor.into(),
            kind,
            proxy,
            started_at,
            ended_at: Utc::now(),
            failure_kind: Some(failure_kind),
            detail: Some(detail.into()),
            cancelled: false,
        }
    }

    /// Creates a record for an attempt interrupted by cancellation.
    pub fn cancelled(
        extractor: impl Into<String>,
        kind: ExtractorKind,
        proxy: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            extractor: extractor.into(),
            kind,
            proxy,
            started_at,
            ended_at: Utc::now(),
            failure_kind: None,
            detail: Some("cancelled".to_string()),
            cancelled: true,
        }
    }

    /// Returns true if the attempt produced media.
    pub fn succeeded(&self) -> bool {
        self.failure_kind.is_none() && !self.cancelled
    }
}
