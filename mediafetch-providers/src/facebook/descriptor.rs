//! Facebook platform descriptor.

use mediafetch_core::{Platform, Quality};

use super::recipes::fdown_recipe;
use crate::descriptor::{ChainPlan, PlatformDescriptor, PlatformMetadata, with_remote_fallback};
use crate::extractors::{BrowserRecipe, NATIVE_EXTRACTOR_ID};
use crate::settings::ExtractorSettings;

pub fn facebook_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        platform: Platform::Facebook,
        metadata: facebook_metadata(),
        chain_plan: facebook_chain_plan(),
    }
}

fn facebook_metadata() -> PlatformMetadata {
    PlatformMetadata {
        display_name: "Facebook",
        sample_url: "https://www.facebook.com/watch?v=10153231379946729",
        default_quality: Quality::Best,
    }
}

fn facebook_chain_plan() -> ChainPlan {
    ChainPlan {
        recipes: facebook_recipes,
        default_order: facebook_default_order,
    }
}

fn facebook_recipes() -> Vec<BrowserRecipe> {
    vec![fdown_recipe()]
}

fn facebook_default_order(settings: &ExtractorSettings) -> Vec<String> {
    let mut order = vec![NATIVE_EXTRACTOR_ID.to_string()];
    order.extend(facebook_recipes().iter().map(BrowserRecipe::extractor_id));
    with_remote_fallback(order, settings)
}
