//! Mirror-site recipes for Facebook.

use crate::extractors::BrowserRecipe;

/// fdown.net: HD link when offered, SD otherwise.
pub fn fdown_recipe() -> BrowserRecipe {
    BrowserRecipe::new(
        "fdown",
        "https://fdown.net/",
        "input[name=URLz]",
        "button[type=submit]",
        "#hdlink, #sdlink",
    )
    .with_blocked_markers(["captcha", "cf-challenge"])
}
