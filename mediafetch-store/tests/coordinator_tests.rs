//! Job coordinator behaviour tests.
//!
//! Chains are built from scripted extractors so admission, dedup,
//! cancellation, and artifact hand-off can be observed without any real
//! backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;

use mediafetch_core::{ExtractorKind, FailureKind, Job, JobId, JobState, MediaRef, Platform};
use mediafetch_fetch::{
    AttemptScope, ExtractContext, ExtractError, ExtractRequest, ExtractedMedia, Extractor,
    ProxyPool, StrategyChain,
};
use mediafetch_providers::ChainSet;
use mediafetch_store::{
    ArtifactStore, CoordinatorConfig, JobCoordinator, RateLimit, SubmitError, SubmitOptions,
};

// ============================================================================
// Scripted Extractors
// ============================================================================

enum Script {
    /// Waits for a gate permit, then returns a remote URL.
    Gated(Arc<Semaphore>),
    /// Fails immediately.
    Fail(FailureKind),
    /// Writes a file into the output dir and returns it.
    WriteFile(&'static [u8]),
}

struct ScriptedExtractor {
    id: String,
    script: Script,
    calls: Arc<AtomicUsize>,
}

impl ScriptedExtractor {
    fn new(id: &str, script: Script) -> Self {
        Self {
            id: id.to_string(),
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::RemoteApi
    }

    fn uses_proxy(&self) -> bool {
        false
    }

    async fn is_available(&self, _ctx: &ExtractContext) -> bool {
        true
    }

    async fn extract(
        &self,
        request: &ExtractRequest,
        scope: &AttemptScope,
        ctx: &ExtractContext,
    ) -> Result<ExtractedMedia, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Gated(gate) => {
                tokio::select! {
                    permit = gate.acquire() => {
                        permit.expect("gate closed").forget();
                        Ok(ExtractedMedia::RemoteUrl(format!("https://cdn.test/{}", request.url.len())))
                    }
                    () = scope.cancel.cancelled() => Err(ExtractError::Cancelled),
                }
            }
            Script::Fail(kind) => Err(match kind {
                FailureKind::RateLimited => ExtractError::RateLimited {
                    retry_after: None,
                    detail: "HTTP Error 429: Too Many Requests".to_string(),
                },
                FailureKind::Fatal => ExtractError::Fatal("Unsupported URL".to_string()),
                _ => ExtractError::Transient("connection reset".to_string()),
            }),
            Script::WriteFile(body) => {
                let path = ctx.output_dir().join(format!("{}.mp4", uuid_like(&request.url)));
                tokio::fs::write(&path, body).await.expect("write output");
                Ok(ExtractedMedia::LocalFile(path))
            }
        }
    }
}

fn uuid_like(url: &str) -> String {
    url.chars().filter(char::is_ascii_alphanumeric).collect()
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    _dir: TempDir,
    coordinator: JobCoordinator,
    artifacts: ArtifactStore,
}

fn harness(config: CoordinatorConfig, extractors: Vec<Arc<dyn Extractor>>) -> Harness {
    let dir = TempDir::new().unwrap();
    let output: PathBuf = dir.path().to_path_buf();
    let chain = StrategyChain::new(Platform::YouTube, Arc::new(ProxyPool::empty()))
        .with_extractors(extractors)
        .with_attempt_timeout(Duration::from_secs(30));
    let ctx = Arc::new(ExtractContext::builder().output_dir(&output).build());
    let artifacts = ArtifactStore::new(&output, Duration::from_secs(600));
    let coordinator = JobCoordinator::new(
        config,
        ChainSet::new().with_chain(chain),
        ctx,
        artifacts.clone(),
    );
    Harness {
        _dir: dir,
        coordinator,
        artifacts,
    }
}

fn config(max_concurrent: usize) -> CoordinatorConfig {
    CoordinatorConfig {
        max_concurrent,
        per_client_limit: None,
        submit_limit: None,
        ..CoordinatorConfig::default()
    }
}

fn gated(gate: &Arc<Semaphore>) -> Vec<Arc<dyn Extractor>> {
    vec![Arc::new(ScriptedExtractor::new(
        "remote.gated",
        Script::Gated(Arc::clone(gate)),
    ))]
}

fn video(n: usize) -> String {
    format!("https://www.youtube.com/watch?v=vid{n}")
}

async fn wait(coordinator: &JobCoordinator, id: &JobId) -> Job {
    tokio::time::timeout(Duration::from_secs(5), coordinator.wait_for(id))
        .await
        .expect("job did not finish in time")
        .unwrap()
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_rejections_create_no_job() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(2), gated(&gate));

    let err = h
        .coordinator
        .submit("not a url", SubmitOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "InvalidURL");

    let err = h
        .coordinator
        .submit("https://vimeo.com/123", SubmitOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), "UnsupportedURL");

    let err = h
        .coordinator
        .submit(&video(1), SubmitOptions::default().with_quality("8k-ultra"))
        .unwrap_err();
    assert_eq!(err.code(), "InvalidQuality");

    let err = h
        .coordinator
        .submit(
            "https://www.tiktok.com/@user/video/123",
            SubmitOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "UnsupportedURL", "no chain for TikTok");

    let stats = h.coordinator.stats();
    assert_eq!(stats.queued + stats.running + stats.finished(), 0);
}

#[tokio::test]
async fn test_submission_rate_limit() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        CoordinatorConfig {
            submit_limit: Some(RateLimit {
                max_requests: 1,
                window: Duration::from_secs(60),
            }),
            ..config(4)
        },
        gated(&gate),
    );
    let as_client = |c: &str| SubmitOptions::default().with_client(c);

    h.coordinator.submit(&video(1), as_client("alice")).unwrap();
    let err = h.coordinator.submit(&video(2), as_client("alice")).unwrap_err();
    assert!(matches!(err, SubmitError::RateLimited { .. }));
    assert!(err.retry_after_secs().unwrap() >= 59);

    let err = h.coordinator.submit(&video(2), as_client("bob")).unwrap_err();
    assert!(matches!(err, SubmitError::RateLimited { .. }));
}

#[tokio::test]
async fn test_global_rate_limit_ignores_client_ids() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        CoordinatorConfig {
            submit_limit: Some(RateLimit {
                max_requests: 2,
                window: Duration::from_secs(60),
            }),
            ..config(4)
        },
        gated(&gate),
    );

    let mut accepted = 0;
    let mut limited = 0;
    for n in 0..50 {
        let options = SubmitOptions::default().with_client(format!("client-{n}"));
        match h.coordinator.submit(&video(n), options) {
            Ok(_) => accepted += 1,
            Err(SubmitError::RateLimited { .. }) => limited += 1,
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }
    assert_eq!(accepted, 2);
    assert_eq!(limited, 48);

    let stats = h.coordinator.stats();
    assert_eq!(stats.queued + stats.running, 2);
}

#[tokio::test]
async fn test_client_rate_limit_inside_global() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        CoordinatorConfig {
            submit_limit: Some(RateLimit {
                max_requests: 10,
                window: Duration::from_secs(60),
            }),
            client_submit_limit: Some(RateLimit {
                max_requests: 1,
                window: Duration::from_secs(60),
            }),
            ..config(4)
        },
        gated(&gate),
    );
    let as_client = |c: &str| SubmitOptions::default().with_client(c);

    h.coordinator.submit(&video(1), as_client("alice")).unwrap();
    let err = h.coordinator.submit(&video(2), as_client("alice")).unwrap_err();
    assert!(matches!(err, SubmitError::RateLimited { .. }));
    h.coordinator.submit(&video(3), as_client("bob")).unwrap();
}

// ============================================================================
// Dedup
// ============================================================================

#[tokio::test]
async fn test_dedup_while_active_then_new_job() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(2), gated(&gate));

    let first = h
        .coordinator
        .submit("https://youtu.be/abc?si=share", SubmitOptions::default())
        .unwrap();
    let second = h
        .coordinator
        .submit(
            "https://www.youtube.com/watch?v=abc&utm_source=feed",
            SubmitOptions::default(),
        )
        .unwrap();
    assert_eq!(first, second);

    let audio = h
        .coordinator
        .submit("https://youtu.be/abc", SubmitOptions::default().with_quality("audio"))
        .unwrap();
    assert_ne!(first, audio);

    gate.add_permits(2);
    assert_eq!(wait(&h.coordinator, &first).await.state, JobState::Succeeded);
    wait(&h.coordinator, &audio).await;

    let third = h
        .coordinator
        .submit("https://youtu.be/abc", SubmitOptions::default())
        .unwrap();
    assert_ne!(first, third);
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_concurrency_cap_leaves_one_queued() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(2), gated(&gate));

    let ids: Vec<JobId> = (0..3)
        .map(|n| h.coordinator.submit(&video(n), SubmitOptions::default()).unwrap())
        .collect();

    let stats = h.coordinator.stats();
    assert_eq!((stats.running, stats.queued), (2, 1));
    assert_eq!(h.coordinator.status(&ids[2]).unwrap().state, JobState::Queued);

    gate.add_permits(1);
    let mut changes = h.coordinator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.coordinator.stats().succeeded == 0 {
            changes.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    let stats = h.coordinator.stats();
    assert_eq!((stats.running, stats.queued, stats.succeeded), (2, 0, 1));

    gate.add_permits(2);
    for id in &ids {
        assert_eq!(wait(&h.coordinator, id).await.state, JobState::Succeeded);
    }
}

#[tokio::test]
async fn test_per_client_limit() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        CoordinatorConfig {
            per_client_limit: Some(1),
            ..config(4)
        },
        gated(&gate),
    );
    let as_client = |c: &str| SubmitOptions::default().with_client(c);

    let a1 = h.coordinator.submit(&video(1), as_client("alice")).unwrap();
    let a2 = h.coordinator.submit(&video(2), as_client("alice")).unwrap();
    let b1 = h.coordinator.submit(&video(3), as_client("bob")).unwrap();

    assert_eq!(h.coordinator.status(&a1).unwrap().state, JobState::Running);
    assert_eq!(h.coordinator.status(&a2).unwrap().state, JobState::Queued);
    assert_eq!(h.coordinator.status(&b1).unwrap().state, JobState::Running);

    gate.add_permits(3);
    for id in [&a1, &a2, &b1] {
        assert_eq!(wait(&h.coordinator, id).await.state, JobState::Succeeded);
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_running_job_ends_cancelled() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(1), gated(&gate));

    let id = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    // Let the attempt start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = h.coordinator.cancel(&id).unwrap();
    assert_eq!(snapshot.state, JobState::Running);

    let job = wait(&h.coordinator, &id).await;
    assert_eq!(job.state, JobState::Cancelled);
    assert!(job.failure.is_none());
    assert!(job.attempts.last().is_some_and(|a| a.cancelled));

    // Cancelling a terminal job is a no-op.
    assert_eq!(h.coordinator.cancel(&id).unwrap().state, JobState::Cancelled);
}

#[tokio::test]
async fn test_cancel_queued_job() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(1), gated(&gate));

    let running = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    let queued = h.coordinator.submit(&video(2), SubmitOptions::default()).unwrap();

    let job = h.coordinator.cancel(&queued).unwrap();
    assert_eq!(job.state, JobState::Cancelled);
    assert!(job.attempts.is_empty());

    gate.add_permits(1);
    assert_eq!(wait(&h.coordinator, &running).await.state, JobState::Succeeded);
    assert_eq!(h.coordinator.stats().running, 0);
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(1), gated(&gate));
    assert!(h.coordinator.cancel(&JobId::new("missing")).is_err());
    assert!(h.coordinator.status(&JobId::new("missing")).is_none());
}

#[tokio::test]
async fn test_shutdown_cancels_everything() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(config(1), gated(&gate));

    let running = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    let queued = h.coordinator.submit(&video(2), SubmitOptions::default()).unwrap();

    h.coordinator.shutdown();
    assert!(h.coordinator.is_shutting_down());
    assert_eq!(h.coordinator.status(&queued).unwrap().state, JobState::Cancelled);
    assert_eq!(wait(&h.coordinator, &running).await.state, JobState::Cancelled);

    let err = h
        .coordinator
        .submit(&video(3), SubmitOptions::default())
        .unwrap_err();
    assert_eq!(err, SubmitError::ShuttingDown);
}

// ============================================================================
// Results
// ============================================================================

#[tokio::test]
async fn test_failure_carries_last_kind() {
    let h = harness(
        config(1),
        vec![
            Arc::new(ScriptedExtractor::new("remote.a", Script::Fail(FailureKind::Transient))),
            Arc::new(ScriptedExtractor::new("remote.b", Script::Fail(FailureKind::RateLimited))),
        ],
    );

    let id = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    let job = wait(&h.coordinator, &id).await;

    assert_eq!(job.state, JobState::Failed);
    let failure = job.failure.unwrap();
    assert_eq!(failure.kind, FailureKind::RateLimited);
    assert_eq!(failure.message, FailureKind::RateLimited.user_message());
    assert!(failure.detail.unwrap().contains("429"));
    let extractors: Vec<&str> = job.attempts.iter().map(|a| a.extractor.as_str()).collect();
    assert_eq!(extractors, vec!["remote.a", "remote.b"]);
}

#[tokio::test]
async fn test_fatal_stops_chain() {
    let fallback = Arc::new(ScriptedExtractor::new("remote.b", Script::WriteFile(b"x")));
    let calls = Arc::clone(&fallback.calls);
    let h = harness(
        config(1),
        vec![
            Arc::new(ScriptedExtractor::new("remote.a", Script::Fail(FailureKind::Fatal))),
            fallback,
        ],
    );

    let id = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    let job = wait(&h.coordinator, &id).await;

    assert_eq!(job.failure.unwrap().kind, FailureKind::Fatal);
    assert_eq!(job.attempts.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_job_deadline_fails_with_timeout() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        CoordinatorConfig {
            job_timeout: Duration::from_millis(100),
            ..config(1)
        },
        gated(&gate),
    );

    let id = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    let job = wait(&h.coordinator, &id).await;

    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.failure.unwrap().kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_local_file_becomes_artifact() {
    let h = harness(
        config(1),
        vec![Arc::new(ScriptedExtractor::new(
            "native.fake",
            Script::WriteFile(b"mp4-bytes"),
        ))],
    );

    let id = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    let job = wait(&h.coordinator, &id).await;

    let Some(MediaRef::Local { artifact_id }) = job.result else {
        panic!("expected a local result, got {:?}", job.result);
    };
    let artifact = h.artifacts.get(&artifact_id).unwrap();
    assert!(artifact.file_name.ends_with(".mp4"));

    let mut reader = h.artifacts.open(&artifact_id).await.unwrap();
    let mut body = Vec::new();
    reader.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"mp4-bytes");
    assert!(h.artifacts.get(&artifact_id).is_none());
}

#[tokio::test]
async fn test_finished_jobs_are_evicted_after_retention() {
    let gate = Arc::new(Semaphore::new(1));
    let h = harness(
        CoordinatorConfig {
            retention: Duration::from_secs(60),
            ..config(1)
        },
        gated(&gate),
    );

    let id = h.coordinator.submit(&video(1), SubmitOptions::default()).unwrap();
    wait(&h.coordinator, &id).await;

    assert_eq!(h.coordinator.evict_finished(), 0);
    let later = chrono::Utc::now() + chrono::Duration::seconds(61);
    assert_eq!(h.coordinator.evict_finished_at(later), 1);
    assert!(h.coordinator.status(&id).is_none());
}
