//! Extractor settings shared by every platform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mediafetch_core::Platform;

use crate::extractors::{BrowserRecipe, NativeToolConfig, RemoteApiConfig};

/// How extractors are built and ordered.
///
/// Missing sections fall back to each platform's descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractorSettings {
    /// Native tool settings.
    pub native: NativeToolConfig,
    /// Remote API settings.
    pub remote: RemoteApiConfig,
    /// Extra or replacement browser recipes, matched by name.
    pub recipes: Vec<BrowserRecipe>,
    /// Per-platform chain order overrides (extractor ids).
    pub chains: BTreeMap<Platform, Vec<String>>,
}

impl ExtractorSettings {
    /// Sets the chain order for `platform`.
    pub fn with_chain<I, S>(mut self, platform: Platform, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chains
            .insert(platform, ids.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the remote endpoint.
    pub fn with_remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.remote.endpoint = Some(endpoint.into());
        self
    }

    /// Returns the configured override for `platform`, if any.
    pub fn chain_override(&self, platform: Platform) -> Option<&[String]> {
        self.chains.get(&platform).map(Vec::as_slice)
    }
}
