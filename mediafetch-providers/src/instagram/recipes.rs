//! Mirror-site recipes for Instagram.

use crate::extractors::BrowserRecipe;

/// snapinsta.app.
pub fn snapinsta_recipe() -> BrowserRecipe {
    BrowserRecipe::new(
        "snapinsta",
        "https://snapinsta.app/",
        "#url",
        "button[type=submit]",
        ".download-bottom a, a.abutton.is-success",
    )
    .with_blocked_markers(["captcha", "cf-challenge", "rate limit exceeded"])
}
