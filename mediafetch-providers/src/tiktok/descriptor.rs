//! TikTok platform descriptor.

use mediafetch_core::{Platform, Quality};

use super::recipes::{snaptik_recipe, ssstik_recipe};
use crate::descriptor::{ChainPlan, PlatformDescriptor, PlatformMetadata, with_remote_fallback};
use crate::extractors::BrowserRecipe;
use crate::settings::ExtractorSettings;

pub fn tiktok_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        platform: Platform::TikTok,
        metadata: tiktok_metadata(),
        chain_plan: tiktok_chain_plan(),
    }
}

fn tiktok_metadata() -> PlatformMetadata {
    PlatformMetadata {
        display_name: "TikTok",
        sample_url: "https://www.tiktok.com/@scout2015/video/6718335390845095173",
        default_quality: Quality::Best,
    }
}

fn tiktok_chain_plan() -> ChainPlan {
    ChainPlan {
        recipes: tiktok_recipes,
        default_order: tiktok_default_order,
    }
}

fn tiktok_recipes() -> Vec<BrowserRecipe> {
    vec![ssstik_recipe(), snaptik_recipe()]
}

fn tiktok_default_order(settings: &ExtractorSettings) -> Vec<String> {
    let order = tiktok_recipes()
        .iter()
        .map(BrowserRecipe::extractor_id)
        .collect();
    with_remote_fallback(order, settings)
}
