//! Shared handler state.

use std::sync::Arc;

use mediafetch_fetch::ProxyPool;
use mediafetch_store::{ArtifactStore, JobCoordinator};

/// State shared by every handler. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Job coordinator.
    pub coordinator: JobCoordinator,
    /// Artifact store downloads are served from.
    pub artifacts: ArtifactStore,
    /// Proxy pool, for health reporting.
    pub proxies: Arc<ProxyPool>,
}

impl AppState {
    /// Creates state serving the coordinator's own artifact store.
    pub fn new(coordinator: JobCoordinator, proxies: Arc<ProxyPool>) -> Self {
        let artifacts = coordinator.artifacts().clone();
        Self {
            coordinator,
            artifacts,
            proxies,
        }
    }
}
