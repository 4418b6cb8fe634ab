// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MediaFetch` Fetch
//!
//! Extraction orchestration and host APIs for `MediaFetch`.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::http`] - HTTP client with per-proxy clients
//! - [`host::process`] - Subprocess execution that kills on cancel
//! - [`host::browser`] - Headless browser sessions
//!
//! ## Strategy Chain
//!
//! - [`extractor::Extractor`] - Trait for extraction backends
//! - [`chain::StrategyChain`] - Tries extractors in configured order
//! - [`proxy::ProxyPool`] - Egress proxy rotation with cooldowns
//! - [`context::ExtractContext`] - Provides access to host APIs
//!
//! ## Example
//!
//! ```ignore
//! use mediafetch_fetch::{ExtractContext, ProxyPool, StrategyChain};
//!
//! let ctx = ExtractContext::new();
//! let chain = StrategyChain::new(Platform::TikTok, Arc::new(ProxyPool::empty()))
//!     .with_extractors(vec![snaptik, remote_api]);
//!
//! let outcome = chain.resolve(&request, &ctx, &cancel, deadline).await;
//! ```

pub mod chain;
pub mod context;
pub mod error;
pub mod extractor;
pub mod host;
pub mod proxy;
pub mod retry;

// Re-export key types at crate root

// Errors
pub use error::{BrowserError, ExtractError, HttpError, ProcessError, ResolveError};

// Host APIs
pub use host::{
    browser::{BrowserLauncher, BrowserSession, ChromiumLauncher, LaunchOptions, ValueSource},
    http::{HttpClient, ResponseExt},
    process::{ProcessOutput, ProcessRunner},
};

// Extractors & chain
pub use chain::{ResolveOutcome, StrategyChain};
pub use context::{ExtractContext, ExtractContextBuilder, ExtractSettings};
pub use extractor::{AttemptScope, ExtractRequest, ExtractedMedia, Extraction, Extractor};
pub use proxy::{ProxyEntry, ProxyHealth, ProxyPool};
pub use retry::Backoff;

// Re-exported so downstream crates share one token type.
pub use tokio_util::sync::CancellationToken;
