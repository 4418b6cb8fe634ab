//! Job coordinator.
//!
//! Owns every [`Job`] from submission until eviction:
//!
//! - classifies and deduplicates submissions synchronously
//! - admits queued jobs under a global and a per-client running cap
//! - runs each admitted job's strategy chain on its own task
//! - registers local results with the [`ArtifactStore`]
//! - cancels on request or shutdown
//!
//! State lives in one mutex-guarded [`JobTable`](table::JobTable); readers
//! get cloned snapshots and never wait on extraction.

mod limiter;
mod table;

pub use limiter::RateLimit;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use mediafetch_core::{
    Classifier, FailureKind, Job, JobFailure, JobId, MediaRef, Quality,
};
use mediafetch_fetch::{
    ExtractContext, ExtractRequest, ExtractedMedia, Extraction, ResolveError, StrategyChain,
};
use mediafetch_providers::{ChainSet, PlatformRegistry};

use crate::artifacts::ArtifactStore;
use crate::error::{CoordinatorError, SubmitError};
use limiter::SubmissionLimiter;
use table::{Completion, JobTable};

/// Rate-limit key shared by submissions without a client id.
const ANONYMOUS_CLIENT: &str = "anonymous";

// ============================================================================
// Configuration
// ============================================================================

/// Coordinator limits and lifetimes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Global cap on running jobs.
    pub max_concurrent: usize,
    /// Cap on running jobs per client; `None` = unlimited.
    pub per_client_limit: Option<usize>,
    /// Deadline for a whole job across all attempts.
    pub job_timeout: Duration,
    /// How long terminal jobs stay queryable.
    pub retention: Duration,
    /// Submission rate limit shared by all clients; `None` = unlimited.
    pub submit_limit: Option<RateLimit>,
    /// Additional submission rate limit per client; `None` = unlimited.
    pub client_submit_limit: Option<RateLimit>,
    /// Whether the classifier validates path shapes.
    pub strict_urls: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            per_client_limit: Some(2),
            job_timeout: Duration::from_secs(600),
            retention: Duration::from_secs(3600),
            submit_limit: Some(RateLimit {
                max_requests: 30,
                window: Duration::from_secs(60),
            }),
            client_submit_limit: None,
            strict_urls: true,
        }
    }
}

/// Per-submission options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Quality hint; the platform default applies when absent.
    pub quality: Option<String>,
    /// Submitting client, for per-client limits.
    pub client_id: Option<String>,
}

impl SubmitOptions {
    /// Sets the quality hint.
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Sets the client id.
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

/// Job counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    /// Waiting for a slot.
    pub queued: usize,
    /// Currently extracting.
    pub running: usize,
    /// Finished with media.
    pub succeeded: usize,
    /// Finished without media.
    pub failed: usize,
    /// Cancelled by a client or shutdown.
    pub cancelled: usize,
}

impl JobStats {
    /// Jobs in a terminal state.
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

// ============================================================================
// Coordinator
// ============================================================================

struct Inner {
    config: CoordinatorConfig,
    classifier: Classifier,
    chains: ChainSet,
    ctx: Arc<ExtractContext>,
    artifacts: ArtifactStore,
    table: Mutex<JobTable>,
    limiter: Mutex<SubmissionLimiter>,
    changes: watch::Sender<u64>,
    shutdown: CancellationToken,
}

impl Inner {
    fn table(&self) -> MutexGuard<'_, JobTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn limiter(&self) -> MutexGuard<'_, SubmissionLimiter> {
        self.limiter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// Accepts, schedules, and tracks extraction jobs. Cheap to clone.
///
/// Methods that may start jobs must be called inside a Tokio runtime.
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<Inner>,
}

impl JobCoordinator {
    /// Creates a coordinator over prebuilt chains.
    pub fn new(
        config: CoordinatorConfig,
        chains: ChainSet,
        ctx: Arc<ExtractContext>,
        artifacts: ArtifactStore,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        let classifier = Classifier::new().with_strict(config.strict_urls);
        let limiter = SubmissionLimiter::new(config.submit_limit, config.client_submit_limit);
        info!(
            max_concurrent = config.max_concurrent,
            per_client_limit = ?config.per_client_limit,
            platforms = chains.len(),
            "Job coordinator ready"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                classifier,
                chains,
                ctx,
                artifacts,
                table: Mutex::new(JobTable::new()),
                limiter: Mutex::new(limiter),
                changes,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Returns the configured chains.
    pub fn chains(&self) -> &ChainSet {
        &self.inner.chains
    }

    /// Returns the artifact store results are registered with.
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.inner.artifacts
    }

    /// Submits a URL for extraction.
    ///
    /// Returns the id of an existing job when an identical (URL, quality)
    /// request is still queued or running.
    ///
    /// # Errors
    ///
    /// Rejections happen here, synchronously, and create no job.
    #[instrument(skip(self, options), fields(client = options.client_id.as_deref().unwrap_or("-")))]
    pub fn submit(&self, url: &str, options: SubmitOptions) -> Result<JobId, SubmitError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SubmitError::ShuttingDown);
        }

        let key = options.client_id.as_deref().unwrap_or(ANONYMOUS_CLIENT);
        self.inner
            .limiter()
            .check(key)
            .map_err(|retry_after| SubmitError::RateLimited { retry_after })?;

        let classified = self.inner.classifier.classify(url)?;
        let platform = classified.platform;
        let quality = match options.quality.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q.parse::<Quality>()?,
            _ => PlatformRegistry::get(platform).map_or_else(Quality::default, |d| d.default_quality()),
        };
        if !self.inner.chains.contains(platform) {
            return Err(SubmitError::UnsupportedUrl(format!(
                "no extractors configured for {}",
                platform.display_name()
            )));
        }

        let job = Job::new(
            JobId::new(Uuid::new_v4().to_string()),
            url.trim(),
            classified.normalized,
            platform,
            quality,
            options.client_id,
        );
        let cancel = self.inner.shutdown.child_token();
        let (id, created) = self.inner.table().insert_or_existing(job, cancel);

        if created {
            info!(job = %id, platform = %platform, quality = %quality, "Job queued");
            self.inner.notify();
            self.pump();
        } else {
            info!(job = %id, "Duplicate submission, returning active job");
        }
        Ok(id)
    }

    /// Returns a snapshot of a job.
    pub fn status(&self, id: &JobId) -> Option<Job> {
        self.inner.table().get(id).cloned()
    }

    /// Cancels a job.
    ///
    /// A queued job is cancelled at once. A running job has its token
    /// fired and is returned still `Running`; it becomes `Cancelled` once
    /// its attempt stops. Terminal jobs are left as they are.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NotFound`] for unknown or evicted ids.
    pub fn cancel(&self, id: &JobId) -> Result<Job, CoordinatorError> {
        let (job, changed) = self
            .inner
            .table()
            .cancel(id)
            .ok_or_else(|| CoordinatorError::NotFound(id.clone()))?;

        if changed {
            info!(job = %id, "Queued job cancelled");
            self.inner.notify();
        } else if !job.is_terminal() {
            info!(job = %id, "Cancellation requested");
        }
        Ok(job)
    }

    /// Subscribes to state changes. The value is a change counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Waits until a job reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::NotFound`] if the job is unknown or is
    /// evicted while waiting.
    pub async fn wait_for(&self, id: &JobId) -> Result<Job, CoordinatorError> {
        let mut changes = self.subscribe();
        loop {
            let job = self
                .status(id)
                .ok_or_else(|| CoordinatorError::NotFound(id.clone()))?;
            if job.is_terminal() {
                return Ok(job);
            }
            changes
                .changed()
                .await
                .map_err(|_| CoordinatorError::NotFound(id.clone()))?;
        }
    }

    /// Job counts by state.
    pub fn stats(&self) -> JobStats {
        self.inner.table().stats()
    }

    /// Evicts terminal jobs past the retention window.
    pub fn evict_finished(&self) -> usize {
        self.evict_finished_at(Utc::now())
    }

    /// [`evict_finished`](Self::evict_finished) against a given clock.
    pub fn evict_finished_at(&self, now: DateTime<Utc>) -> usize {
        let evicted = self
            .inner
            .table()
            .evict_finished(now, self.inner.config.retention);
        if evicted > 0 {
            debug!(evicted, "Evicted finished jobs");
        }
        evicted
    }

    /// Runs [`evict_finished`](Self::evict_finished) every `interval` until
    /// shutdown.
    pub fn spawn_janitor(&self, interval: Duration) -> JoinHandle<()> {
        let coordinator = self.clone();
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        coordinator.evict_finished();
                    }
                }
            }
            debug!("Job janitor stopped");
        })
    }

    /// Returns true once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Stops accepting work and cancels every queued and running job.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let cancelled = self.inner.table().cancel_queued();
        let running = self.stats().running;
        info!(queued = cancelled, running, "Coordinator shutting down");
        self.inner.notify();
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Starts queued jobs while slots are free.
    fn pump(&self) {
        loop {
            if self.inner.shutdown.is_cancelled() {
                return;
            }
            let admitted = self.inner.table().admit_next(
                self.inner.config.max_concurrent,
                self.inner.config.per_client_limit,
            );
            let Some((job, cancel)) = admitted else {
                return;
            };
            debug!(job = %job.id, platform = %job.platform, "Job admitted");
            self.inner.notify();
            self.spawn_job(job, cancel);
        }
    }

    fn spawn_job(&self, job: Job, cancel: CancellationToken) {
        let id = job.id.clone();
        let Some(chain) = self.inner.chains.get(job.platform) else {
            error!(job = %id, platform = %job.platform, "No chain for admitted job");
            self.finish(
                &id,
                Completion::Failed(JobFailure::new(FailureKind::Fatal, None), Vec::new()),
            );
            return;
        };

        let coordinator = self.clone();
        let ctx = Arc::clone(&self.inner.ctx);
        let artifacts = self.inner.artifacts.clone();
        let job_timeout = self.inner.config.job_timeout;

        tokio::spawn(async move {
            let run = tokio::spawn(run_job(chain, ctx, artifacts, job, cancel, job_timeout));
            let completion = match run.await {
                Ok(completion) => completion,
                Err(e) => {
                    error!(job = %id, error = %e, "Job task failed");
                    Completion::Failed(
                        JobFailure::new(FailureKind::Fatal, Some(e.to_string())),
                        Vec::new(),
                    )
                }
            };
            coordinator.finish(&id, completion);
        });
    }

    fn finish(&self, id: &JobId, completion: Completion) {
        let finished = self.inner.table().complete(id, completion);
        if let Some(job) = finished {
            info!(
                job = %id,
                state = %job.state,
                attempts = job.attempts.len(),
                "Job finished"
            );
            self.inner.notify();
        }
        self.pump();
    }
}

impl std::fmt::Debug for JobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("config", &self.inner.config)
            .field("chains", &self.inner.chains)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Job Execution
// ============================================================================

#[instrument(skip_all, fields(job = %job.id, platform = %job.platform))]
async fn run_job(
    chain: Arc<StrategyChain>,
    ctx: Arc<ExtractContext>,
    artifacts: ArtifactStore,
    job: Job,
    cancel: CancellationToken,
    job_timeout: Duration,
) -> Completion {
    let request = ExtractRequest::new(job.url.clone(), job.platform, job.quality);
    let deadline = Instant::now() + job_timeout;
    let outcome = chain.resolve(&request, &ctx, &cancel, deadline).await;
    debug!(
        job = %job.id,
        attempts = outcome.attempts.len(),
        duration = ?outcome.duration,
        "Chain finished"
    );
    let attempts = outcome.attempts;

    if cancel.is_cancelled() {
        if let Ok(Extraction {
            media: ExtractedMedia::LocalFile(path),
            ..
        }) = &outcome.result
        {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to discard output of cancelled job");
            }
        }
        return Completion::Cancelled(attempts);
    }

    match outcome.result {
        Ok(extraction) => match extraction.media {
            ExtractedMedia::RemoteUrl(url) => Completion::Succeeded(MediaRef::Remote { url }, attempts),
            ExtractedMedia::LocalFile(path) => match artifacts.register(&path).await {
                Ok(artifact_id) => Completion::Succeeded(MediaRef::Local { artifact_id }, attempts),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Extractor output could not be registered");
                    Completion::Failed(
                        JobFailure::new(
                            FailureKind::Transient,
                            Some(format!("output {} unavailable: {e}", path.display())),
                        ),
                        attempts,
                    )
                }
            },
        },
        Err(ResolveError::Cancelled) => Completion::Cancelled(attempts),
        Err(err) => {
            let kind = err.kind().unwrap_or(FailureKind::Transient);
            let detail = match err {
                ResolveError::Failed { detail, .. } => detail,
                other => other.to_string(),
            };
            Completion::Failed(JobFailure::new(kind, Some(detail)), attempts)
        }
    }
}
