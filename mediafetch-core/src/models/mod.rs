//! Domain models for `MediaFetch`.
//!
//! ## Submodules
//!
//! - [`platform`] - Platform tags
//! - [`quality`] - Requested quality hints
//! - [`failure`] - Failure classification
//! - [`media`] - Media references and artifact ids
//! - [`attempt`] - Extractor attempt records
//! - [`job`] - Job model and state machine

mod attempt;
mod failure;
mod job;
mod media;
mod platform;
mod quality;

pub use attempt::{AttemptRecord, ExtractorKind};
pub use failure::FailureKind;
pub use job::{Job, JobFailure, JobId, JobState};
pub use media::{ArtifactId, MediaRef};
pub use platform::Platform;
pub use quality::Quality;
