// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MediaFetch` Providers
//!
//! Concrete extractors and per-platform configuration.
//!
//! Each platform module includes:
//!
//! - **Descriptor**: Static configuration (metadata, default quality, chain plan)
//! - **Recipes**: Mirror sites that can be driven by a headless browser
//!
//! ## Supported Platforms
//!
//! | Platform | Native tool | Mirror sites | Remote API |
//! |----------|-------------|--------------|------------|
//! | YouTube | ✅ | ❌ | ✅ |
//! | TikTok | ❌ | ssstik, snaptik | ✅ |
//! | Instagram | ✅ | snapinsta | ✅ |
//! | Facebook | ✅ | fdown | ✅ |
//!
//! The remote API joins every default chain once an endpoint is configured.
//!
//! ## Usage
//!
//! ```ignore
//! use mediafetch_providers::{ExtractorSettings, PlatformRegistry};
//!
//! let chains = PlatformRegistry::build_chains(&settings, &proxies, attempt_timeout)?;
//! let chain = chains.get(Platform::TikTok).unwrap();
//! let outcome = chain.resolve(&request, &ctx, &cancel, deadline).await;
//! ```

pub mod descriptor;
pub mod error;
pub mod extractors;
pub mod registry;
pub mod settings;

// Platform modules (alphabetical)
pub mod facebook;
pub mod instagram;
pub mod tiktok;
pub mod youtube;

// Re-export key types
pub use descriptor::{ChainPlan, PlatformDescriptor, PlatformMetadata};
pub use error::ProviderError;
pub use extractors::{
    BROWSER_ID_PREFIX, BrowserAutomationExtractor, BrowserRecipe, NATIVE_EXTRACTOR_ID,
    NativeToolConfig, NativeToolExtractor, REMOTE_EXTRACTOR_ID, RemoteApiConfig,
    RemoteApiExtractor,
};
pub use registry::{ChainSet, PlatformRegistry};
pub use settings::ExtractorSettings;

// Re-export platform descriptors
pub use facebook::facebook_descriptor;
pub use instagram::instagram_descriptor;
pub use tiktok::tiktok_descriptor;
pub use youtube::youtube_descriptor;
