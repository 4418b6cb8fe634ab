// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MediaFetch` Core
//!
//! Core types and URL classification for the `MediaFetch` orchestration
//! service.
//!
//! This crate provides the foundational abstractions used across all other
//! `MediaFetch` crates, including:
//!
//! - Domain models (jobs, attempts, media references)
//! - The platform classifier and URL normalization
//! - Error types
//!
//! ## Key Types
//!
//! ### Routing
//! - [`Platform`] - Supported video platforms
//! - [`Classifier`] - Maps raw URLs to platforms
//! - [`ClassifiedUrl`] - Platform plus normalized dedup key
//!
//! ### Jobs
//! - [`Job`] - One extraction request and its state machine
//! - [`JobState`] - Queued, running, or terminal
//! - [`AttemptRecord`] - One extractor attempt
//! - [`MediaRef`] - Remote URL or local artifact
//!
//! ### Classification
//! - [`FailureKind`] - Why an extraction attempt failed
//! - [`Quality`] - Requested output quality

pub mod classifier;
pub mod error;
pub mod models;

// Re-export error types
pub use error::{ClassifyError, QualityError};

// Re-export the classifier
pub use classifier::{ClassifiedUrl, Classifier};

// Re-export all model types
pub use models::{
    // Attempts
    AttemptRecord,
    ExtractorKind,
    FailureKind,
    // Jobs
    Job,
    JobFailure,
    JobId,
    JobState,
    // Media
    ArtifactId,
    MediaRef,
    // Routing
    Platform,
    Quality,
};
