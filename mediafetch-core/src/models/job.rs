//! Job model and state machine.
//!
//! A [`Job`] is one extraction request. Its state only moves forward:
//!
//! ```text
//! Queued ──► Running ──► Succeeded | Failed | Cancelled
//!    └─────────────────► Cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AttemptRecord, FailureKind, MediaRef, Platform, Quality};

// ============================================================================
// Job Id
// ============================================================================

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wraps an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Job State
// ============================================================================

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for an admission slot.
    Queued,
    /// The strategy chain is running.
    Running,
    /// Media was produced; `result` is set.
    Succeeded,
    /// Every extractor failed; `failure` is set.
    Failed,
    /// Cancelled by a client or by shutdown.
    Cancelled,
}

impl JobState {
    /// Returns true for states that are never left.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => next.is_terminal(),
            Self::Succeeded | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Returns the lowercase state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Job Failure
// ============================================================================

/// Client-facing failure summary attached to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Classification driving client messaging.
    pub kind: FailureKind,
    /// Human-actionable message.
    pub message: String,
    /// Raw backend diagnostic, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JobFailure {
    /// Builds a failure with the standard message for `kind`.
    pub fn new(kind: FailureKind, detail: Option<String>) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            detail,
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// One extraction request and everything known about its progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique identifier.
    #[serde(rename = "jobId")]
    pub id: JobId,
    /// Original input URL.
    pub url: String,
    /// Normalized URL used for deduplication.
    pub normalized_url: String,
    /// Classified platform.
    pub platform: Platform,
    /// Requested quality.
    pub quality: Quality,
    /// Current state.
    pub state: JobState,
    /// Attempts made so far, in chain order.
    pub attempts: Vec<AttemptRecord>,
    /// Media reference, present only when succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MediaRef>,
    /// Failure summary, present only when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<JobFailure>,
    /// Submitting client, used for per-client admission. Never serialized.
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the job started running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a queued job.
    pub fn new(
        id: JobId,
        url: impl Into<String>,
        normalized_url: impl Into<String>,
        platform: Platform,
        quality: Quality,
        client_id: Option<String>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            normalized_url: normalized_url.into(),
            platform,
            quality,
            state: JobState::Queued,
            attempts: Vec::new(),
            result: None,
            failure: None,
            client_id,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Moves the job to `Running`. Returns false if the transition is illegal.
    pub fn start(&mut self) -> bool {
        if !self.transition(JobState::Running) {
            return false;
        }
        self.started_at = Some(Utc::now());
        true
    }

    /// Marks the job succeeded with `result`.
    pub fn succeed(&mut self, result: MediaRef, attempts: Vec<AttemptRecord>) -> bool {
        if !self.transition(JobState::Succeeded) {
            return false;
        }
        self.result = Some(result);
        self.attempts = attempts;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Marks the job failed with `failure`.
    pub fn fail(&mut self, failure: JobFailure, attempts: Vec<AttemptRecord>) -> bool {
        if !self.transition(JobState::Failed) {
            return false;
        }
        self.failure = Some(failure);
        self.attempts = attempts;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Marks the job cancelled, keeping any attempts made.
    pub fn cancel(&mut self, attempts: Option<Vec<AttemptRecord>>) -> bool {
        if !self.transition(JobState::Cancelled) {
            return false;
        }
        if let Some(attempts) = attempts {
            self.attempts = attempts;
        }
        self.finished_at = Some(Utc::now());
        true
    }

    fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued() -> Job {
        Job::new(
            JobId::new("j1"),
            "https://youtu.be/abc",
            "https://youtube.com/watch?v=abc",
            Platform::YouTube,
            Quality::Best,
            None,
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = queued();
        assert!(job.start());
        assert_eq!(job.state, JobState::Running);
        assert!(job.started_at.is_some());

        let media = MediaRef::Remote {
            url: "https://cdn/x.mp4".to_string(),
        };
        assert!(job.succeed(media.clone(), Vec::new()));
        assert_eq!(job.result, Some(media));
        assert!(job.is_terminal());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_never_left() {
        let mut job = queued();
        assert!(job.cancel(None));
        assert!(!job.start());
        assert!(!job.fail(JobFailure::new(FailureKind::Fatal, None), Vec::new()));
        assert_eq!(job.state, JobState::Cancelled);
    }

    #[test]
    fn test_queued_cannot_finish_without_running() {
        let mut job = queued();
        assert!(!job.fail(JobFailure::new(FailureKind::Transient, None), Vec::new()));
        assert_eq!(job.state, JobState::Queued);
    }

    #[test]
    fn test_job_wire_shape() {
        let mut job = queued();
        job.client_id = Some("alice".to_string());
        job.start();
        job.fail(
            JobFailure::new(FailureKind::RateLimited, Some("HTTP Error 429".to_string())),
            Vec::new(),
        );
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["jobId"], "j1");
        assert_eq!(json["state"], "failed");
        assert_eq!(json["failure"]["kind"], "RateLimited");
        assert_eq!(json["failure"]["detail"], "HTTP Error 429");
        assert!(json.get("result").is_none());
        assert!(json.get("clientId").is_none());
        assert!(!json.to_string().contains("alice"));
    }
}
