//! Headless-browser extractor.
//!
//! Drives a third-party mirror site through a declarative
//! [`BrowserRecipe`]: open the entry page, type the source URL, submit,
//! then poll for the element holding the direct media link.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use url::Url;

use mediafetch_core::ExtractorKind;
use mediafetch_fetch::{
    AttemptScope, BrowserError, BrowserSession, ExtractContext, ExtractError, ExtractRequest,
    ExtractedMedia, Extractor, LaunchOptions, ValueSource,
};

/// Prefix of every browser extractor id.
pub const BROWSER_ID_PREFIX: &str = "browser.";

/// Delay between result polls.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// Recipe
// ============================================================================

/// Declarative description of a mirror site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserRecipe {
    /// Short name; the extractor id is `browser.<name>`.
    pub name: String,
    /// Page to open.
    pub entry_url: String,
    /// Field receiving the source URL.
    pub input_selector: String,
    /// Button that starts the conversion.
    pub submit_selector: String,
    /// Element holding the media link.
    pub result_selector: String,
    /// Where the link lives on the result element.
    #[serde(default = "default_result_extraction")]
    pub result_extraction: ValueSource,
    /// Case-insensitive page markers meaning the site refused us.
    #[serde(default)]
    pub blocked_markers: Vec<String>,
    /// Upper bound on waiting for the result element.
    #[serde(default = "default_result_timeout_secs")]
    pub result_timeout_secs: u64,
}

fn default_result_extraction() -> ValueSource {
    ValueSource::Attribute("href".to_string())
}

fn default_result_timeout_secs() -> u64 {
    45
}

impl BrowserRecipe {
    /// Creates a recipe reading `href` from the result element.
    pub fn new(
        name: impl Into<String>,
        entry_url: impl Into<String>,
        input_selector: impl Into<String>,
        submit_selector: impl Into<String>,
        result_selector: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entry_url: entry_url.into(),
            input_selector: input_selector.into(),
            submit_selector: submit_selector.into(),
            result_selector: result_selector.into(),
            result_extraction: default_result_extraction(),
            blocked_markers: Vec::new(),
            result_timeout_secs: default_result_timeout_secs(),
        }
    }

    /// Sets where the link is read from.
    pub fn with_result_extraction(mut self, source: ValueSource) -> Self {
        self.result_extraction = source;
        self
    }

    /// Sets the blocked-page markers.
    pub fn with_blocked_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the result wait bound.
    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout_secs = timeout.as_secs();
        self
    }

    /// Extractor id for this recipe.
    pub fn extractor_id(&self) -> String {
        format!("{BROWSER_ID_PREFIX}{}", self.name)
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Extractor that runs a [`BrowserRecipe`] in a headless browser.
#[derive(Debug, Clone)]
pub struct BrowserAutomationExtractor {
    id: String,
    recipe: BrowserRecipe,
}

impl BrowserAutomationExtractor {
    /// Creates an extractor for `recipe`.
    pub fn new(recipe: BrowserRecipe) -> Self {
        Self {
            id: recipe.extractor_id(),
            recipe,
        }
    }

    /// Returns the recipe.
    pub fn recipe(&self) -> &BrowserRecipe {
        &self.recipe
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        request: &ExtractRequest,
        budget: Duration,
    ) -> Result<ExtractedMedia, ExtractError> {
        let recipe = &self.recipe;

        session.goto(&recipe.entry_url).await?;
        self.check_blocked(session).await?;

        session.fill(&recipe.input_selector, &request.url).await?;
        session.click(&recipe.submit_selector).await?;
        debug!(recipe = %recipe.name, "Submitted source URL");

        let deadline = Instant::now() + budget;
        loop {
            if let Some(raw) = session
                .query(&recipe.result_selector, &recipe.result_extraction)
                .await?
            {
                if let Some(url) = media_url(&recipe.entry_url, &raw) {
                    return Ok(ExtractedMedia::RemoteUrl(url));
                }
                debug!(value = %raw, "Result element has no usable link yet");
            }

            self.check_blocked(session).await?;

            if Instant::now() >= deadline {
                return Err(BrowserError::SelectorTimeout(format!(
                    "{}: `{}` within {budget:?}",
                    recipe.name, recipe.result_selector
                ))
                .into());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn check_blocked(&self, session: &mut dyn BrowserSession) -> Result<(), ExtractError> {
        if self.recipe.blocked_markers.is_empty() {
            return Ok(());
        }
        let html = session.content().await?.to_lowercase();
        match self
            .recipe
            .blocked_markers
            .iter()
            .find(|m| html.contains(&m.to_lowercase()))
        {
            Some(marker) => Err(ExtractError::Blocked(format!(
                "{}: page shows `{marker}`",
                self.recipe.name
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Extractor for BrowserAutomationExtractor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::BrowserAutomation
    }

    async fn is_available(&self, ctx: &ExtractContext) -> bool {
        ctx.browser.is_available()
    }

    #[instrument(skip(self, scope, ctx), fields(extractor = %self.id, url = %request.url))]
    async fn extract(
        &self,
        request: &ExtractRequest,
        scope: &AttemptScope,
        ctx: &ExtractContext,
    ) -> Result<ExtractedMedia, ExtractError> {
        let options = LaunchOptions {
            proxy: scope.proxy.clone(),
            ..LaunchOptions::default()
        };

        let mut session = tokio::select! {
            launched = ctx.browser.launch(&options) => launched?,
            () = scope.cancel.cancelled() => return Err(ExtractError::Cancelled),
        };

        let budget = Duration::from_secs(self.recipe.result_timeout_secs).min(scope.timeout);
        let result = tokio::select! {
            result = self.drive(session.as_mut(), request, budget) => result,
            () = scope.cancel.cancelled() => Err(ExtractError::Cancelled),
        };

        session.close().await;
        if let Err(e) = &result {
            warn!(recipe = %self.recipe.name, error = %e, "Browser extraction failed");
        }
        result
    }
}

/// Resolves `raw` against the entry page and accepts only http(s) links.
fn media_url(base: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = Url::parse(raw)
        .or_else(|_| Url::parse(base).and_then(|b| b.join(raw)))
        .ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mediafetch_core::{FailureKind, Platform, Quality};
    use mediafetch_fetch::{BrowserError, BrowserLauncher, CancellationToken};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Script {
        /// Result appears on the given poll.
        ResultAfter(usize),
        /// Page shows a captcha after submit.
        Captcha,
        /// Result never appears.
        Never,
        /// Navigation fails.
        NavFails,
    }

    struct FakeLauncher {
        script: Script,
        closes: Arc<AtomicUsize>,
        proxies: Arc<std::sync::Mutex<Vec<Option<String>>>>,
    }

    impl FakeLauncher {
        fn new(script: Script) -> Self {
            Self {
                script,
                closes: Arc::new(AtomicUsize::new(0)),
                proxies: Arc::default(),
            }
        }
    }

    struct FakeSession {
        script: Script,
        polls: usize,
        submitted: bool,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        fn is_available(&self) -> bool {
            true
        }

        async fn launch(
            &self,
            options: &LaunchOptions,
        ) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.proxies.lock().unwrap().push(options.proxy.clone());
            Ok(Box::new(FakeSession {
                script: self.script,
                polls: 0,
                submitted: false,
                closes: self.closes.clone(),
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
            match self.script {
                Script::NavFails => Err(BrowserError::Navigation(url.to_string())),
                _ => Ok(()),
            }
        }

        async fn fill(&mut self, _selector: &str, _value: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn click(&mut self, _selector: &str) -> Result<(), BrowserError> {
            self.submitted = true;
            Ok(())
        }

        async fn query(
            &mut self,
            _selector: &str,
            _source: &ValueSource,
        ) -> Result<Option<String>, BrowserError> {
            self.polls += 1;
            Ok(match self.script {
                Script::ResultAfter(n) if self.polls >= n => {
                    Some("/dl/video.mp4?token=1".to_string())
                }
                _ => None,
            })
        }

        async fn content(&mut self) -> Result<String, BrowserError> {
            Ok(match self.script {
                Script::Captcha if self.submitted => "<div>Please complete the CAPTCHA</div>",
                _ => "<html>ok</html>",
            }
            .to_string())
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn recipe() -> BrowserRecipe {
        BrowserRecipe::new("mirror", "https://mirror.test/en", "#url", "#go", "a.dl")
            .with_blocked_markers(["captcha"])
            .with_result_timeout(Duration::from_secs(2))
    }

    fn request() -> ExtractRequest {
        ExtractRequest::new(
            "https://www.tiktok.com/@u/video/1",
            Platform::TikTok,
            Quality::Best,
        )
    }

    fn context(launcher: FakeLauncher) -> ExtractContext {
        ExtractContext::builder().browser(Arc::new(launcher)).build()
    }

    fn scope() -> AttemptScope {
        AttemptScope::new(CancellationToken::new(), Duration::from_secs(10))
    }

    #[test]
    fn test_recipe_serde_defaults() {
        let json = r##"{
            "name": "x",
            "entryUrl": "https://x.test",
            "inputSelector": "#i",
            "submitSelector": "#s",
            "resultSelector": "a"
        }"##;
        let recipe: BrowserRecipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.result_extraction, ValueSource::Attribute("href".to_string()));
        assert!(recipe.blocked_markers.is_empty());
        assert_eq!(recipe.extractor_id(), "browser.x");
    }

    #[test]
    fn test_media_url() {
        assert_eq!(
            media_url("https://m.test/en", "/dl/a.mp4").as_deref(),
            Some("https://m.test/dl/a.mp4")
        );
        assert_eq!(
            media_url("https://m.test/", "https://cdn.test/v.mp4").as_deref(),
            Some("https://cdn.test/v.mp4")
        );
        assert_eq!(media_url("https://m.test/", "javascript:void(0)"), None);
        assert_eq!(media_url("https://m.test/", "  "), None);
    }

    #[tokio::test]
    async fn test_success_closes_browser() {
        let launcher = FakeLauncher::new(Script::ResultAfter(2));
        let closes = launcher.closes.clone();
        let proxies = launcher.proxies.clone();
        let ctx = context(launcher);

        let extractor = BrowserAutomationExtractor::new(recipe());
        let scope = scope().with_proxy(Some("http://p:1".to_string()));
        let media = extractor.extract(&request(), &scope, &ctx).await.unwrap();

        assert_eq!(
            media,
            ExtractedMedia::RemoteUrl("https://mirror.test/dl/video.mp4?token=1".to_string())
        );
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(proxies.lock().unwrap().as_slice(), &[Some("http://p:1".to_string())]);
    }

    #[tokio::test]
    async fn test_captcha_is_blocked() {
        let launcher = FakeLauncher::new(Script::Captcha);
        let closes = launcher.closes.clone();
        let ctx = context(launcher);

        let err = BrowserAutomationExtractor::new(recipe())
            .extract(&request(), &scope(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::Blocked));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selector_timeout_is_transient() {
        let launcher = FakeLauncher::new(Script::Never);
        let closes = launcher.closes.clone();
        let ctx = context(launcher);

        let err = BrowserAutomationExtractor::new(recipe())
            .extract(&request(), &scope(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Browser(BrowserError::SelectorTimeout(_))
        ));
        assert_eq!(err.kind(), Some(FailureKind::Transient));
        assert!(err.to_string().contains("Timed out waiting for"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_transient() {
        let launcher = FakeLauncher::new(Script::NavFails);
        let closes = launcher.closes.clone();
        let ctx = context(launcher);

        let err = BrowserAutomationExtractor::new(recipe())
            .extract(&request(), &scope(), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::Transient));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes_browser() {
        let launcher = FakeLauncher::new(Script::Never);
        let closes = launcher.closes.clone();
        let ctx = context(launcher);

        let scope = scope();
        let cancel = scope.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            cancel.cancel();
        });

        let err = BrowserAutomationExtractor::new(recipe())
            .extract(&request(), &scope, &ctx)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
