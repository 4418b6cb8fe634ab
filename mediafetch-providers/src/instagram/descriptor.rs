//! Instagram platform descriptor.

use mediafetch_core::{Platform, Quality};

use super::recipes::snapinsta_recipe;
use crate::descriptor::{ChainPlan, PlatformDescriptor, PlatformMetadata, with_remote_fallback};
use crate::extractors::{BrowserRecipe, NATIVE_EXTRACTOR_ID};
use crate::settings::ExtractorSettings;

pub fn instagram_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        platform: Platform::Instagram,
        metadata: instagram_metadata(),
        chain_plan: instagram_chain_plan(),
    }
}

fn instagram_metadata() -> PlatformMetadata {
    PlatformMetadata {
        display_name: "Instagram",
        sample_url: "https://www.instagram.com/reel/C0abcdEFGhi/",
        default_quality: Quality::Best,
    }
}

fn instagram_chain_plan() -> ChainPlan {
    ChainPlan {
        recipes: instagram_recipes,
        default_order: instagram_default_order,
    }
}

fn instagram_recipes() -> Vec<BrowserRecipe> {
    vec![snapinsta_recipe()]
}

fn instagram_default_order(settings: &ExtractorSettings) -> Vec<String> {
    let mut order = vec![NATIVE_EXTRACTOR_ID.to_string()];
    order.extend(instagram_recipes().iter().map(BrowserRecipe::extractor_id));
    with_remote_fallback(order, settings)
}
