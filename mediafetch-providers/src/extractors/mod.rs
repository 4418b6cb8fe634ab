//! Extractor implementations.
//!
//! - [`native`] - `yt-dlp` compatible subprocess
//! - [`browser`] - Mirror sites driven by a headless browser
//! - [`remote`] - Remote extraction API
//! - [`diagnostics`] - Failure classification for subprocess output

pub mod browser;
pub mod diagnostics;
pub mod native;
pub mod remote;

use std::sync::Arc;

use mediafetch_fetch::Extractor;

pub use browser::{BROWSER_ID_PREFIX, BrowserAutomationExtractor, BrowserRecipe};
pub use native::{NATIVE_EXTRACTOR_ID, NativeToolConfig, NativeToolExtractor};
pub use remote::{REMOTE_EXTRACTOR_ID, RemoteApiConfig, RemoteApiExtractor};

use crate::error::ProviderError;
use crate::settings::ExtractorSettings;

/// Instantiates the extractor named `id`.
///
/// `recipes` are the browser recipes visible to the platform being built.
pub(crate) fn build_extractor(
    id: &str,
    settings: &ExtractorSettings,
    recipes: &[BrowserRecipe],
) -> Result<Arc<dyn Extractor>, ProviderError> {
    if id == NATIVE_EXTRACTOR_ID {
        return Ok(Arc::new(NativeToolExtractor::new(settings.native.clone())));
    }

    if id == REMOTE_EXTRACTOR_ID {
        if !settings.remote.is_configured() {
            return Err(ProviderError::RemoteNotConfigured);
        }
        return Ok(Arc::new(RemoteApiExtractor::new(settings.remote.clone())));
    }

    if let Some(name) = id.strip_prefix(BROWSER_ID_PREFIX) {
        let recipe = recipes
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ProviderError::UnknownRecipe(name.to_string()))?;
        return Ok(Arc::new(BrowserAutomationExtractor::new(recipe.clone())));
    }

    Err(ProviderError::UnknownExtractor(id.to_string()))
}
