//! Platform descriptor system.
//!
//! A descriptor contains the static knowledge about a platform:
//! - Metadata (display name, sample URL, default quality)
//! - Browser recipes for mirror sites that handle it
//! - Chain plan (default extractor order)

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mediafetch_core::{Platform, Quality};
use mediafetch_fetch::{Extractor, ProxyPool, StrategyChain};
use tracing::debug;

use crate::error::ProviderError;
use crate::extractors::{BrowserRecipe, build_extractor};
use crate::settings::ExtractorSettings;

// ============================================================================
// Platform Descriptor
// ============================================================================

/// Complete descriptor for a platform.
pub struct PlatformDescriptor {
    /// Platform identifier.
    pub platform: Platform,
    /// Display metadata.
    pub metadata: PlatformMetadata,
    /// How to build the extractor chain.
    pub chain_plan: ChainPlan,
}

impl PlatformDescriptor {
    /// Returns the display name.
    pub fn display_name(&self) -> &str {
        self.metadata.display_name
    }

    /// Quality used when a submission does not name one.
    pub fn default_quality(&self) -> Quality {
        self.metadata.default_quality
    }

    /// Built-in recipes merged with configured ones (configured wins by name).
    pub fn recipes(&self, settings: &ExtractorSettings) -> Vec<BrowserRecipe> {
        let mut recipes = (self.chain_plan.recipes)();
        for custom in &settings.recipes {
            match recipes.iter_mut().find(|r| r.name == custom.name) {
                Some(existing) => *existing = custom.clone(),
                None => recipes.push(custom.clone()),
            }
        }
        recipes
    }

    /// Extractor ids in the order they will be tried.
    pub fn chain_order(&self, settings: &ExtractorSettings) -> Vec<String> {
        settings
            .chain_override(self.platform)
            .map_or_else(|| (self.chain_plan.default_order)(settings), <[String]>::to_vec)
    }

    /// Builds the strategy chain for this platform.
    ///
    /// # Errors
    ///
    /// Fails when the order names an unknown extractor or recipe, repeats
    /// an id, or is empty.
    pub fn build_chain(
        &self,
        settings: &ExtractorSettings,
        proxies: Arc<ProxyPool>,
        attempt_timeout: Duration,
    ) -> Result<StrategyChain, ProviderError> {
        let order = self.chain_order(settings);
        if order.is_empty() {
            return Err(ProviderError::EmptyChain(self.platform));
        }

        let recipes = self.recipes(settings);
        let mut seen = HashSet::new();
        let mut extractors: Vec<Arc<dyn Extractor>> = Vec::with_capacity(order.len());
        for id in &order {
            if !seen.insert(id.as_str()) {
                return Err(ProviderError::DuplicateExtractor {
                    platform: self.platform,
                    id: id.clone(),
                });
            }
            extractors.push(build_extractor(id, settings, &recipes)?);
        }

        debug!(platform = %self.platform, order = ?order, "Built strategy chain");
        Ok(StrategyChain::new(self.platform, proxies)
            .with_extractors(extractors)
            .with_attempt_timeout(attempt_timeout))
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Display information about a platform.
#[derive(Debug, Clone)]
pub struct PlatformMetadata {
    /// Display name.
    pub display_name: &'static str,
    /// Example URL accepted by the classifier.
    pub sample_url: &'static str,
    /// Quality used when none is requested.
    pub default_quality: Quality,
}

// ============================================================================
// Chain Plan
// ============================================================================

/// Default extractor chain for a platform.
pub struct ChainPlan {
    /// Built-in browser recipes.
    pub recipes: fn() -> Vec<BrowserRecipe>,
    /// Default order; may depend on what is configured.
    pub default_order: fn(&ExtractorSettings) -> Vec<String>,
}

impl Default for ChainPlan {
    fn default() -> Self {
        Self {
            recipes: Vec::new,
            default_order: |_| Vec::new(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Appends `remote.api` when an endpoint is configured.
pub(crate) fn with_remote_fallback(
    mut order: Vec<String>,
    settings: &ExtractorSettings,
) -> Vec<String> {
    if settings.remote.is_configured() {
        order.push(crate::extractors::REMOTE_EXTRACTOR_ID.to_string());
    }
    order
}
