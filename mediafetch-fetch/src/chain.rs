//! Strategy chain: ordered extractor fallback for one platform.
//!
//! Extractors run strictly in configured order, one at a time. Each attempt
//! gets its own proxy, timeout, and child cancellation token, and leaves an
//! [`AttemptRecord`] behind whatever happens. The chain stops at the first
//! success or the first `Fatal` failure.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use mediafetch_core::{AttemptRecord, FailureKind, Platform};

use crate::context::ExtractContext;
use crate::error::{ExtractError, ResolveError};
use crate::extractor::{AttemptScope, ExtractRequest, ExtractedMedia, Extraction, Extractor};
use crate::proxy::ProxyPool;

/// Default per-attempt timeout.
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Resolve Outcome
// ============================================================================

/// The outcome of running a strategy chain.
#[derive(Debug)]
pub struct ResolveOutcome {
    /// The result (success or final error).
    pub result: Result<Extraction, ResolveError>,
    /// All attempts made, in chain order.
    pub attempts: Vec<AttemptRecord>,
    /// Total duration of all attempts.
    pub duration: Duration,
}

/// How one attempt ended.
enum AttemptEnd {
    Finished(Result<ExtractedMedia, ExtractError>),
    TimedOut,
    Cancelled,
}

// ============================================================================
// Strategy Chain
// ============================================================================

/// Ordered fallback sequence of extractors for one platform.
pub struct StrategyChain {
    platform: Platform,
    extractors: Vec<Arc<dyn Extractor>>,
    proxies: Arc<ProxyPool>,
    attempt_timeout: Duration,
}

impl StrategyChain {
    /// Creates an empty chain.
    pub fn new(platform: Platform, proxies: Arc<ProxyPool>) -> Self {
        Self {
            platform,
            extractors: Vec::new(),
            proxies,
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
        }
    }

    /// Replaces the extractor list. Order is preserved as given.
    pub fn with_extractors(mut self, extractors: Vec<Arc<dyn Extractor>>) -> Self {
        self.extractors = extractors;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Returns the platform this chain serves.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Returns the per-attempt timeout.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Returns the number of extractors in the chain.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Returns true if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Returns extractor IDs in chain order.
    pub fn extractor_ids(&self) -> Vec<String> {
        self.extractors.iter().map(|e| e.id().to_string()).collect()
    }

    /// Runs extractors in order until one succeeds.
    ///
    /// `cancel` is the job's token; `deadline` is the job deadline, which
    /// also clamps each attempt's timeout.
    #[instrument(
        skip(self, request, ctx, cancel),
        fields(platform = %self.platform, extractors = self.extractors.len())
    )]
    pub async fn resolve(
        &self,
        request: &ExtractRequest,
        ctx: &ExtractContext,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> ResolveOutcome {
        let start = Instant::now();
        let mut attempts = Vec::with_capacity(self.extractors.len());
        let finish = |result, attempts| ResolveOutcome {
            result,
            attempts,
            duration: start.elapsed(),
        };

        if self.extractors.is_empty() {
            return finish(Err(ResolveError::NoExtractors), attempts);
        }

        info!(count = self.extractors.len(), "Executing strategy chain");
        let mut last_failure: Option<(FailureKind, String)> = None;

        for extractor in &self.extractors {
            let extractor_id = extractor.id();
            let kind = extractor.kind();

            if cancel.is_cancelled() {
                return finish(Err(ResolveError::Cancelled), attempts);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!("Job deadline reached before next extractor");
                return finish(Err(ResolveError::DeadlineExceeded(start.elapsed())), attempts);
            }

            debug!(extractor = %extractor_id, kind = %kind, "Checking extractor availability");
            if !extractor.is_available(ctx).await {
                debug!(extractor = %extractor_id, "Extractor not available, skipping");
                let detail = format!("{extractor_id} is not available");
                attempts.push(AttemptRecord::failure(
                    extractor_id,
                    kind,
                    None,
                    Utc::now(),
                    FailureKind::Transient,
                    detail.clone(),
                ));
                last_failure = Some((FailureKind::Transient, detail));
                continue;
            }

            let proxy = if extractor.uses_proxy() {
                self.proxies.next().map(|p| p.address)
            } else {
                None
            };
            let remaining = deadline.saturating_duration_since(now);
            let timeout = self.attempt_timeout.min(remaining);
            let bounded_by_deadline = remaining <= self.attempt_timeout;

            let attempt_cancel = cancel.child_token();
            let scope =
                AttemptScope::new(attempt_cancel.clone(), timeout).with_proxy(proxy.clone());
            let started_at = Utc::now();
            let attempt_start = Instant::now();

            debug!(extractor = %extractor_id, proxy = ?proxy, timeout = ?timeout, "Executing extractor");

            let end = {
                let fut = extractor.extract(request, &scope, ctx);
                tokio::pin!(fut);

                let end = tokio::select! {
                    result = &mut fut => AttemptEnd::Finished(result),
                    () = tokio::time::sleep(timeout) => AttemptEnd::TimedOut,
                    () = cancel.cancelled() => AttemptEnd::Cancelled,
                };

                if !matches!(end, AttemptEnd::Finished(_)) {
                    attempt_cancel.cancel();
                    if tokio::time::timeout(ctx.settings.cancel_grace, &mut fut)
                        .await
                        .is_err()
                    {
                        warn!(extractor = %extractor_id, "Extractor ignored cancellation, dropping it");
                    }
                }
                end
            };
            let duration = attempt_start.elapsed();

            match end {
                AttemptEnd::Finished(Ok(media)) => {
                    info!(extractor = %extractor_id, duration = ?duration, "Extractor succeeded");
                    if let Some(address) = &proxy {
                        self.proxies.report_outcome(address, true);
                    }
                    attempts.push(AttemptRecord::success(extractor_id, kind, proxy, started_at));
                    let extraction = Extraction {
                        media,
                        extractor_id: extractor_id.to_string(),
                        kind,
                    };
                    return finish(Ok(extraction), attempts);
                }
                AttemptEnd::Finished(Err(error)) if error.is_cancelled() && cancel.is_cancelled() => {
                    attempts.push(AttemptRecord::cancelled(extractor_id, kind, proxy, started_at));
                    return finish(Err(ResolveError::Cancelled), attempts);
                }
                AttemptEnd::Finished(Err(error)) => {
                    let failure = error.kind().unwrap_or(FailureKind::Transient);
                    let detail = error.to_string();
                    warn!(
                        extractor = %extractor_id,
                        kind = %failure,
                        error = %detail,
                        duration = ?duration,
                        "Extractor failed"
                    );
                    if let Some(address) = &proxy {
                        self.proxies
                            .report_outcome(address, !failure.implicates_proxy());
                    }
                    attempts.push(AttemptRecord::failure(
                        extractor_id,
                        kind,
                        proxy,
                        started_at,
                        failure,
                        detail.clone(),
                    ));

                    if failure == FailureKind::Fatal {
                        debug!(extractor = %extractor_id, "Fatal failure, stopping chain");
                        return finish(Err(ResolveError::Failed { kind: failure, detail }), attempts);
                    }
                    last_failure = Some((failure, detail));
                }
                AttemptEnd::TimedOut => {
                    let detail = format!("{extractor_id} timed out after {timeout:?}");
                    warn!(extractor = %extractor_id, timeout = ?timeout, "Extractor timed out");
                    if let Some(address) = &proxy {
                        self.proxies.report_outcome(address, false);
                    }
                    attempts.push(AttemptRecord::failure(
                        extractor_id,
                        kind,
                        proxy,
                        started_at,
                        FailureKind::Timeout,
                        detail.clone(),
                    ));
                    if bounded_by_deadline {
                        return finish(
                            Err(ResolveError::DeadlineExceeded(start.elapsed())),
                            attempts,
                        );
                    }
                    last_failure = Some((FailureKind::Timeout, detail));
                }
                AttemptEnd::Cancelled => {
                    info!(extractor = %extractor_id, "Attempt cancelled");
                    attempts.push(AttemptRecord::cancelled(extractor_id, kind, proxy, started_at));
                    return finish(Err(ResolveError::Cancelled), attempts);
                }
            }
        }

        warn!("All extractors failed");
        let (kind, detail) = last_failure
            .unwrap_or((FailureKind::Transient, "no extractor succeeded".to_string()));
        finish(Err(ResolveError::Failed { kind, detail }), attempts)
    }
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyChain")
            .field("platform", &self.platform)
            .field("extractors", &self.extractor_ids())
            .field("attempt_timeout", &self.attempt_timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediafetch_core::{ExtractorKind, Quality};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail(FailureKind),
        /// Waits until cancelled, then reports cancellation.
        Hang,
        /// Never returns.
        Stuck,
    }

    struct MockExtractor {
        id: String,
        behavior: Behavior,
        available: bool,
        uses_proxy: bool,
        calls: AtomicUsize,
        saw_cancel: AtomicBool,
    }

    impl MockExtractor {
        fn new(id: &str, behavior: Behavior) -> Self {
            Self {
                id: id.to_string(),
                behavior,
                available: true,
                uses_proxy: true,
                calls: AtomicUsize::new(0),
                saw_cancel: AtomicBool::new(false),
            }
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }

        fn direct(mut self) -> Self {
            self.uses_proxy = false;
            self
        }
    }

    #[async_trait]
    impl Extractor for MockExtractor {
        fn id(&self) -> &str {
            &self.id
        }

        fn kind(&self) -> ExtractorKind {
            ExtractorKind::RemoteApi
        }

        fn uses_proxy(&self) -> bool {
            self.uses_proxy
        }

        async fn is_available(&self, _ctx: &ExtractContext) -> bool {
            self.available
        }

        async fn extract(
            &self,
            _request: &ExtractRequest,
            scope: &AttemptScope,
            _ctx: &ExtractContext,
        ) -> Result<ExtractedMedia, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(ExtractedMedia::RemoteUrl(format!(
                    "https://cdn.example.com/{}.mp4",
                    self.id
                ))),
                Behavior::Fail(kind) => Err(match kind {
                    FailureKind::RateLimited => ExtractError::RateLimited {
                        retry_after: None,
                        detail: "429".to_string(),
                    },
                    FailureKind::Blocked => ExtractError::Blocked("captcha".to_string()),
                    FailureKind::Timeout => ExtractError::Timeout("slow".to_string()),
                    FailureKind::NotFound => ExtractError::NotFound("gone".to_string()),
                    FailureKind::Transient => ExtractError::Transient("flaky".to_string()),
                    FailureKind::Fatal => ExtractError::Fatal("unsupported".to_string()),
                }),
                Behavior::Hang => {
                    scope.cancel.cancelled().await;
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Err(ExtractError::Cancelled)
                }
                Behavior::Stuck => std::future::pending().await,
            }
        }
    }

    fn ctx() -> ExtractContext {
        ExtractContext::builder()
            .settings(
                crate::context::ExtractSettings::default()
                    .with_cancel_grace(Duration::from_millis(100)),
            )
            .build()
    }

    fn request() -> ExtractRequest {
        ExtractRequest::new("https://youtu.be/abc", Platform::YouTube, Quality::Best)
    }

    fn chain(extractors: Vec<Arc<dyn Extractor>>) -> StrategyChain {
        StrategyChain::new(Platform::YouTube, Arc::new(ProxyPool::empty()))
            .with_extractors(extractors)
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let outcome = chain(vec![])
            .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
            .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.result.as_ref().unwrap_err(), &ResolveError::NoExtractors);
    }

    #[tokio::test]
    async fn test_transient_failure_falls_back() {
        let outcome = chain(vec![
            Arc::new(MockExtractor::new("a.fail", Behavior::Fail(FailureKind::Transient))),
            Arc::new(MockExtractor::new("b.ok", Behavior::Succeed)),
        ])
        .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
        .await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].extractor, "a.fail");
        assert_eq!(outcome.attempts[0].failure_kind, Some(FailureKind::Transient));
        assert_eq!(outcome.attempts[1].extractor, "b.ok");
        assert!(outcome.attempts[1].succeeded());
        assert_eq!(outcome.result.as_ref().unwrap().extractor_id, "b.ok");
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_chain() {
        let second = Arc::new(MockExtractor::new("b.ok", Behavior::Succeed));
        let outcome = chain(vec![
            Arc::new(MockExtractor::new("a.fatal", Behavior::Fail(FailureKind::Fatal))),
            second.clone(),
        ])
        .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
        .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.result.as_ref().unwrap_err().kind(), Some(FailureKind::Fatal));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_last_kind() {
        let outcome = chain(vec![
            Arc::new(MockExtractor::new("a", Behavior::Fail(FailureKind::Blocked))),
            Arc::new(MockExtractor::new("b", Behavior::Fail(FailureKind::RateLimited))),
        ])
        .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
        .await;

        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(
            outcome.result.as_ref().unwrap_err().kind(),
            Some(FailureKind::RateLimited)
        );
    }

    #[tokio::test]
    async fn test_unavailable_extractor_is_recorded_and_skipped() {
        let skipped = Arc::new(MockExtractor::new("a.missing", Behavior::Succeed).unavailable());
        let outcome = chain(vec![
            skipped.clone(),
            Arc::new(MockExtractor::new("b.ok", Behavior::Succeed)),
        ])
        .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
        .await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts.len(), 2);
        assert!(
            outcome.attempts[0]
                .detail
                .as_deref()
                .is_some_and(|d| d.contains("not available"))
        );
        assert_eq!(skipped.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_attempt_timeout_cancels_and_falls_back() {
        let slow = Arc::new(MockExtractor::new("a.slow", Behavior::Hang));
        let outcome = chain(vec![
            slow.clone(),
            Arc::new(MockExtractor::new("b.ok", Behavior::Succeed)),
        ])
        .with_attempt_timeout(Duration::from_millis(50))
        .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
        .await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.attempts[0].failure_kind, Some(FailureKind::Timeout));
        assert!(slow.saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stuck_extractor_is_dropped_after_grace() {
        let outcome = chain(vec![
            Arc::new(MockExtractor::new("a.stuck", Behavior::Stuck)),
            Arc::new(MockExtractor::new("b.ok", Behavior::Succeed)),
        ])
        .with_attempt_timeout(Duration::from_millis(50))
        .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
        .await;

        assert!(outcome.result.is_ok());
        assert!(outcome.duration < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_job_deadline_stops_chain() {
        let second = Arc::new(MockExtractor::new("b.ok", Behavior::Succeed));
        let outcome = chain(vec![
            Arc::new(MockExtractor::new("a.slow", Behavior::Hang)),
            second.clone(),
        ])
        .with_attempt_timeout(Duration::from_secs(30))
        .resolve(
            &request(),
            &ctx(),
            &CancellationToken::new(),
            Instant::now() + Duration::from_millis(50),
        )
        .await;

        assert_eq!(outcome.result.as_ref().unwrap_err().kind(), Some(FailureKind::Timeout));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_attempt() {
        let slow = Arc::new(MockExtractor::new("a.slow", Behavior::Hang));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = chain(vec![slow.clone()])
            .resolve(&request(), &ctx(), &cancel, far_deadline())
            .await;

        assert_eq!(outcome.result.as_ref().unwrap_err(), &ResolveError::Cancelled);
        assert_eq!(outcome.attempts.len(), 1);
        assert!(outcome.attempts[0].cancelled);
        assert!(slow.saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_proxy_assignment_and_reporting() {
        let pool = Arc::new(ProxyPool::new(["http://p1:8080"]));
        let outcome = StrategyChain::new(Platform::TikTok, pool.clone())
            .with_extractors(vec![
                Arc::new(MockExtractor::new("a.direct", Behavior::Fail(FailureKind::NotFound)).direct()),
                Arc::new(MockExtractor::new("b.blocked", Behavior::Fail(FailureKind::Blocked))),
            ])
            .resolve(&request(), &ctx(), &CancellationToken::new(), far_deadline())
            .await;

        assert_eq!(outcome.attempts[0].proxy, None);
        assert_eq!(outcome.attempts[1].proxy.as_deref(), Some("http://p1:8080"));
        assert_eq!(pool.snapshot()[0].consecutive_failures, 1);
    }
}
