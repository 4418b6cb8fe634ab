//! YouTube platform descriptor.

use mediafetch_core::{Platform, Quality};

use crate::descriptor::{ChainPlan, PlatformDescriptor, PlatformMetadata, with_remote_fallback};
use crate::extractors::NATIVE_EXTRACTOR_ID;
use crate::settings::ExtractorSettings;

pub fn youtube_descriptor() -> PlatformDescriptor {
    PlatformDescriptor {
        platform: Platform::YouTube,
        metadata: youtube_metadata(),
        chain_plan: youtube_chain_plan(),
    }
}

fn youtube_metadata() -> PlatformMetadata {
    PlatformMetadata {
        display_name: "YouTube",
        sample_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        default_quality: Quality::Best,
    }
}

fn youtube_chain_plan() -> ChainPlan {
    ChainPlan {
        recipes: Vec::new,
        default_order: youtube_default_order,
    }
}

fn youtube_default_order(settings: &ExtractorSettings) -> Vec<String> {
    with_remote_fallback(vec![NATIVE_EXTRACTOR_ID.to_string()], settings)
}
