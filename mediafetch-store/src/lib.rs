// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MediaFetch` Store
//!
//! Stateful services for `MediaFetch`.
//!
//! This crate provides:
//!
//! - **`JobCoordinator`**: Job table, admission control, dedup, cancellation
//! - **`ArtifactStore`**: Downloaded files, released on full read or TTL
//! - **`AppConfig`**: JSON configuration with environment overrides
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use mediafetch_store::{AppConfig, ArtifactStore, JobCoordinator, SubmitOptions};
//!
//! let config = AppConfig::load(None)?;
//! let artifacts = ArtifactStore::new(config.artifact_dir(), config.artifact_ttl());
//! let coordinator = JobCoordinator::new(config.coordinator_config(), chains, ctx, artifacts);
//!
//! let id = coordinator.submit("https://youtu.be/dQw4w9WgXcQ", SubmitOptions::default())?;
//! let job = coordinator.wait_for(&id).await?;
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod jobs;
pub mod persistence;

pub use artifacts::{Artifact, ArtifactReader, ArtifactStore, SweepReport};
pub use config::{
    AppConfig, ArtifactsConfig, BrowserConfig, ClassifierConfig, JobsConfig, ProxyConfig,
    ServerConfig,
};
pub use error::{CoordinatorError, StoreError, SubmitError};
pub use jobs::{CoordinatorConfig, JobCoordinator, JobStats, RateLimit, SubmitOptions};
pub use persistence::{
    default_artifact_dir, default_config_dir, default_config_path, ensure_dir, load_json,
    save_json,
};
