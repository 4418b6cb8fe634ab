//! Provider configuration errors.

use thiserror::Error;

use mediafetch_core::Platform;

/// Errors raised while building per-platform chains.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// An id that names no extractor.
    #[error("Unknown extractor: {0}")]
    UnknownExtractor(String),

    /// `browser.<name>` with no recipe called `<name>`.
    #[error("Unknown browser recipe: {0}")]
    UnknownRecipe(String),

    /// `remote.api` referenced without an endpoint.
    #[error("remote.api is in a chain but no remote endpoint is configured")]
    RemoteNotConfigured,

    /// A platform ended up with no extractors.
    #[error("No extractors configured for {0}")]
    EmptyChain(Platform),

    /// A chain lists the same extractor twice.
    #[error("Extractor {id} appears more than once in the {platform} chain")]
    DuplicateExtractor {
        /// Platform whose chain is invalid.
        platform: Platform,
        /// Repeated id.
        id: String,
    },
}
