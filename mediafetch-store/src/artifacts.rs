//! On-disk artifact store.
//!
//! Files produced by local extractors are registered here and handed out
//! by id. An artifact is deleted exactly once: when a reader reaches end of
//! file, on explicit release, or when its TTL expires.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mediafetch_core::ArtifactId;

use crate::error::StoreError;
use crate::persistence::ensure_dir;

// ============================================================================
// Artifact
// ============================================================================

/// A registered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Identifier handed to clients.
    pub id: ArtifactId,
    /// Location on disk.
    pub file_path: PathBuf,
    /// Name offered for download.
    pub file_name: String,
    /// Size in bytes at registration.
    pub size: u64,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Whether a reader has streamed it to the end.
    pub consumed: bool,
}

impl Artifact {
    fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

/// What a sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Registered artifacts past their TTL.
    pub expired: usize,
    /// Unregistered files past the TTL.
    pub orphans: usize,
}

impl SweepReport {
    /// Returns true if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.orphans == 0
    }
}

// ============================================================================
// Artifact Store
// ============================================================================

struct StoreInner {
    dir: PathBuf,
    ttl: Duration,
    table: Mutex<HashMap<ArtifactId, Artifact>>,
}

/// Registry of downloadable files. Cheap to clone.
#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                dir: dir.into(),
                ttl,
                table: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates the artifact directory if needed.
    pub async fn init(&self) -> Result<(), StoreError> {
        ensure_dir(&self.inner.dir).await
    }

    /// Returns the artifact directory.
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Returns the time-to-live.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<ArtifactId, Artifact>> {
        self.inner
            .table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live artifacts.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if no artifacts are live.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Looks up an artifact.
    pub fn get(&self, id: &ArtifactId) -> Option<Artifact> {
        self.table().get(id).cloned()
    }

    /// Registers an existing file.
    pub async fn register(&self, path: &Path) -> Result<ArtifactId, StoreError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| StoreError::ArtifactNotFound(path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(StoreError::ArtifactNotFound(path.display().to_string()));
        }

        let id = ArtifactId::new(Uuid::new_v4().simple().to_string());
        let file_name = path
            .file_name()
            .map_or_else(|| id.to_string(), |n| n.to_string_lossy().into_owned());
        let artifact = Artifact {
            id: id.clone(),
            file_path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
            created_at: Utc::now(),
            consumed: false,
        };

        info!(artifact = %id, path = %path.display(), size = artifact.size, "Registered artifact");
        self.table().insert(id.clone(), artifact);
        Ok(id)
    }

    /// Opens an artifact for streaming.
    ///
    /// The reader releases the artifact once it reaches end of file.
    pub async fn open(&self, id: &ArtifactId) -> Result<ArtifactReader, StoreError> {
        let artifact = self
            .get(id)
            .ok_or_else(|| StoreError::ArtifactNotFound(id.to_string()))?;

        match tokio::fs::File::open(&artifact.file_path).await {
            Ok(file) => {
                debug!(artifact = %id, "Opened artifact");
                Ok(ArtifactReader {
                    file: Some(file),
                    artifact,
                    store: self.clone(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(artifact = %id, "Artifact file vanished");
                self.take(id);
                Err(StoreError::ArtifactNotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes an artifact. Unknown ids and missing files are not errors.
    ///
    /// Returns true if this call removed the entry.
    pub async fn release(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        let Some(artifact) = self.take(id) else {
            return Ok(false);
        };
        remove_file(&artifact.file_path).await?;
        info!(artifact = %id, "Released artifact");
        Ok(true)
    }

    /// Removes the entry under the lock so only one caller deletes the file.
    fn take(&self, id: &ArtifactId) -> Option<Artifact> {
        self.table().remove(id)
    }

    fn release_in_background(&self, id: &ArtifactId) {
        let Some(artifact) = self.take(id) else {
            return;
        };
        let path = artifact.file_path;
        let id = id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                match remove_file(&path).await {
                    Ok(()) => info!(artifact = %id, "Released consumed artifact"),
                    Err(e) => warn!(artifact = %id, error = %e, "Failed to delete artifact"),
                }
            });
        } else if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(artifact = %id, error = %e, "Failed to delete artifact");
            }
        }
    }

    /// Releases expired artifacts and deletes stale unregistered files.
    pub async fn sweep_expired(&self) -> Result<SweepReport, StoreError> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// [`sweep_expired`](Self::sweep_expired) against a given clock.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let ttl = self.inner.ttl;
        let mut report = SweepReport::default();

        let expired: Vec<Artifact> = {
            let mut table = self.table();
            let ids: Vec<ArtifactId> = table
                .values()
                .filter(|a| a.age_at(now) >= ttl)
                .map(|a| a.id.clone())
                .collect();
            ids.iter().filter_map(|id| table.remove(id)).collect()
        };
        for artifact in expired {
            if let Err(e) = remove_file(&artifact.file_path).await {
                warn!(artifact = %artifact.id, error = %e, "Failed to delete expired artifact");
            }
            debug!(artifact = %artifact.id, "Expired artifact");
            report.expired += 1;
        }

        let mut entries = match tokio::fs::read_dir(&self.inner.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() || self.is_registered(&path) {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let age = (now - DateTime::<Utc>::from(modified))
                .to_std()
                .unwrap_or_default();
            if age >= ttl {
                match remove_file(&path).await {
                    Ok(()) => {
                        debug!(path = %path.display(), "Deleted orphan file");
                        report.orphans += 1;
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete orphan"),
                }
            }
        }

        Ok(report)
    }

    fn is_registered(&self, path: &Path) -> bool {
        self.table().values().any(|a| a.file_path == path)
    }

    /// Runs [`sweep_expired`](Self::sweep_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => match store.sweep_expired().await {
                        Ok(report) if !report.is_empty() => {
                            info!(expired = report.expired, orphans = report.orphans, "Swept artifacts");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Artifact sweep failed"),
                    },
                }
            }
            debug!("Artifact sweeper stopped");
        })
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("dir", &self.inner.dir)
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

async fn remove_file(path: &Path) -> Result<(), StoreError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Artifact Reader
// ============================================================================

/// Streams an artifact and releases it at end of file.
///
/// Dropping the reader early keeps the artifact until its TTL.
pub struct ArtifactReader {
    file: Option<tokio::fs::File>,
    artifact: Artifact,
    store: ArtifactStore,
}

impl std::fmt::Debug for ArtifactReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactReader")
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

impl ArtifactReader {
    /// The artifact being read.
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    /// Returns true once end of file has been reached.
    pub fn is_consumed(&self) -> bool {
        self.artifact.consumed
    }
}

impl AsyncRead for ArtifactReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let before = buf.filled().len();
        let wants_more = buf.remaining() > 0;
        match Pin::new(file).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if wants_more && buf.filled().len() == before => {
                this.file = None;
                this.artifact.consumed = true;
                this.store.release_in_background(&this.artifact.id);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
