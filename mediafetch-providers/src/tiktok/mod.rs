//! TikTok platform.
//!
//! TikTok is served through mirror sites first; the native tool is
//! throttled too aggressively to lead the chain.

mod descriptor;
mod recipes;

pub use descriptor::tiktok_descriptor;
pub use recipes::{snaptik_recipe, ssstik_recipe};
