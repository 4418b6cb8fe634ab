//! Mirror-site recipes for TikTok.

use mediafetch_fetch::ValueSource;

use crate::extractors::BrowserRecipe;

/// ssstik.io: watermark-free link.
pub fn ssstik_recipe() -> BrowserRecipe {
    BrowserRecipe::new(
        "ssstik",
        "https://ssstik.io/en",
        "#main_page_text",
        "#submit",
        "a.download_link.without_watermark",
    )
    .with_result_extraction(ValueSource::Attribute("href".to_string()))
    .with_blocked_markers(["captcha", "cf-challenge", "access denied"])
}

/// snaptik.app.
pub fn snaptik_recipe() -> BrowserRecipe {
    BrowserRecipe::new(
        "snaptik",
        "https://snaptik.app/en2",
        "#url",
        "button[type=submit]",
        "a.download-file",
    )
    .with_blocked_markers(["captcha", "cf-challenge", "too many requests"])
}
