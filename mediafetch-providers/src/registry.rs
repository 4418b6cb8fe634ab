//! Platform registry.
//!
//! The registry provides static access to every platform descriptor and
//! builds the per-platform strategy chains from configuration.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use mediafetch_core::Platform;
use mediafetch_fetch::{ProxyPool, StrategyChain};
use tracing::info;

use crate::descriptor::PlatformDescriptor;
use crate::error::ProviderError;
use crate::facebook::facebook_descriptor;
use crate::instagram::instagram_descriptor;
use crate::settings::ExtractorSettings;
use crate::tiktok::tiktok_descriptor;
use crate::youtube::youtube_descriptor;

// ============================================================================
// Static Registry
// ============================================================================

/// Static storage for all platform descriptors.
static DESCRIPTORS: OnceLock<Vec<PlatformDescriptor>> = OnceLock::new();

fn init_descriptors() -> Vec<PlatformDescriptor> {
    vec![
        youtube_descriptor(),
        tiktok_descriptor(),
        instagram_descriptor(),
        facebook_descriptor(),
    ]
}

// ============================================================================
// Platform Registry
// ============================================================================

/// Global registry of platform descriptors.
pub struct PlatformRegistry;

impl PlatformRegistry {
    /// Returns all platform descriptors.
    pub fn all() -> &'static [PlatformDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Gets a descriptor by platform.
    pub fn get(platform: Platform) -> Option<&'static PlatformDescriptor> {
        Self::all().iter().find(|d| d.platform == platform)
    }

    /// Returns the number of registered platforms.
    pub fn count() -> usize {
        Self::all().len()
    }

    /// Builds one chain per platform, sharing `proxies`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProviderError`] encountered; a bad override
    /// for one platform fails the whole set.
    pub fn build_chains(
        settings: &ExtractorSettings,
        proxies: &Arc<ProxyPool>,
        attempt_timeout: Duration,
    ) -> Result<ChainSet, ProviderError> {
        let mut set = ChainSet::new();
        for descriptor in Self::all() {
            let chain = descriptor.build_chain(settings, Arc::clone(proxies), attempt_timeout)?;
            set.insert(chain);
        }
        info!(platforms = set.len(), proxies = proxies.len(), "Strategy chains ready");
        Ok(set)
    }
}

// ============================================================================
// Chain Set
// ============================================================================

/// Strategy chains keyed by platform.
#[derive(Clone, Default)]
pub struct ChainSet {
    chains: HashMap<Platform, Arc<StrategyChain>>,
}

impl ChainSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chain, replacing any chain for the same platform.
    pub fn insert(&mut self, chain: StrategyChain) {
        self.chains.insert(chain.platform(), Arc::new(chain));
    }

    /// Adds a chain (builder form).
    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.insert(chain);
        self
    }

    /// Returns the chain for `platform`.
    pub fn get(&self, platform: Platform) -> Option<Arc<StrategyChain>> {
        self.chains.get(&platform).cloned()
    }

    /// Returns true if `platform` has a chain.
    pub fn contains(&self, platform: Platform) -> bool {
        self.chains.contains_key(&platform)
    }

    /// Platforms with a chain, in declaration order.
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .iter()
            .copied()
            .filter(|p| self.chains.contains_key(p))
            .collect()
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Returns true if there are no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl std::fmt::Debug for ChainSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSet")
            .field("platforms", &self.platforms())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
