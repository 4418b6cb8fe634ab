//! CLI command implementations.
//!
//! Every command returns `Ok(true)` on success; `Ok(false)` means the
//! command ran but its outcome was a failure (e.g. a failed job).

pub mod classify;
pub mod config;
pub mod fetch;
pub mod platforms;
pub mod serve;

use std::sync::Arc;

use anyhow::{Context, Result};
use mediafetch_fetch::{ChromiumLauncher, ExtractContext, ProxyPool};
use mediafetch_providers::PlatformRegistry;
use mediafetch_store::{AppConfig, ArtifactStore, JobCoordinator};

use crate::Cli;

/// Loads the configuration named by `--config`, or the default one.
pub(crate) fn load_config(cli: &Cli) -> Result<AppConfig> {
    AppConfig::load(cli.config.as_deref()).context("failed to load configuration")
}

/// Everything a running coordinator needs.
pub(crate) struct Runtime {
    pub coordinator: JobCoordinator,
    pub proxies: Arc<ProxyPool>,
}

/// Wires proxies, extractor chains, the artifact store and the coordinator
/// from `config`.
pub(crate) async fn build_runtime(config: &AppConfig) -> Result<Runtime> {
    let proxies = Arc::new(config.proxy_pool());
    let chains =
        PlatformRegistry::build_chains(&config.extractors, &proxies, config.attempt_timeout())
            .context("invalid extractor configuration")?;

    let mut launcher = ChromiumLauncher::new();
    if let Some(path) = &config.browser.executable {
        launcher = launcher.with_executable(path);
    }
    let artifact_dir = config.artifact_dir();
    let ctx = ExtractContext::builder()
        .browser(Arc::new(launcher))
        .output_dir(&artifact_dir)
        .build();

    let artifacts = ArtifactStore::new(&artifact_dir, config.artifact_ttl());
    artifacts
        .init()
        .await
        .with_context(|| format!("cannot prepare artifact dir {}", artifact_dir.display()))?;

    let coordinator =
        JobCoordinator::new(config.coordinator_config(), chains, Arc::new(ctx), artifacts);
    Ok(Runtime {
        coordinator,
        proxies,
    })
}
