//! Configuration management.
//!
//! Configuration is read from a JSON file (missing file = defaults) and
//! then overridden by `MEDIAFETCH_*` environment variables.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mediafetch_fetch::{Backoff, ProxyPool};
use mediafetch_providers::ExtractorSettings;

use crate::error::StoreError;
use crate::jobs::{CoordinatorConfig, RateLimit};
use crate::persistence::{default_artifact_dir, default_config_path, save_json};

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "MEDIAFETCH_";

// ============================================================================
// Sections
// ============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Job admission and lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobsConfig {
    /// Global cap on running jobs.
    pub max_concurrent: usize,
    /// Cap on running jobs per client; `None` = unlimited.
    pub per_client_limit: Option<usize>,
    /// Per-attempt timeout.
    pub attempt_timeout_secs: u64,
    /// Whole-job deadline.
    pub job_timeout_secs: u64,
    /// How long finished jobs stay queryable.
    pub retention_secs: u64,
    /// How often finished jobs are evicted.
    pub janitor_interval_secs: u64,
    /// Submissions allowed per window across all clients; 0 disables the limit.
    pub submit_limit: u32,
    /// Submissions allowed per window for a single client; 0 disables it.
    pub client_submit_limit: u32,
    /// Submission window length.
    pub submit_window_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            per_client_limit: Some(2),
            attempt_timeout_secs: 120,
            job_timeout_secs: 600,
            retention_secs: 3600,
            janitor_interval_secs: 60,
            submit_limit: 30,
            client_submit_limit: 0,
            submit_window_secs: 60,
        }
    }
}

impl JobsConfig {
    fn submit_rate(&self, max_requests: u32) -> Option<RateLimit> {
        (max_requests > 0).then(|| RateLimit {
            max_requests,
            window: Duration::from_secs(self.submit_window_secs),
        })
    }
}

/// Artifact storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArtifactsConfig {
    /// Directory for downloaded files; `None` = platform cache dir.
    pub dir: Option<PathBuf>,
    /// Time-to-live of an unclaimed artifact.
    pub ttl_secs: u64,
    /// How often expired artifacts are swept.
    pub sweep_interval_secs: u64,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: 1800,
            sweep_interval_secs: 60,
        }
    }
}

/// Egress proxy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Proxy URLs (`http://`, `https://`, `socks5://`).
    pub addresses: Vec<String>,
    /// First cooldown after a failure.
    pub base_backoff_secs: u64,
    /// Cooldown ceiling.
    pub max_backoff_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            base_backoff_secs: 1,
            max_backoff_secs: 300,
        }
    }
}

/// URL classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierConfig {
    /// Validate path shape per platform.
    pub strict: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Chrome/Chromium executable; `None` = search PATH.
    pub executable: Option<PathBuf>,
}

// ============================================================================
// App Config
// ============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Job admission and lifetime.
    pub jobs: JobsConfig,
    /// Artifact storage.
    pub artifacts: ArtifactsConfig,
    /// Egress proxies.
    pub proxies: ProxyConfig,
    /// URL classification.
    pub classifier: ClassifierConfig,
    /// Headless browser.
    pub browser: BrowserConfig,
    /// Extractor settings and chain order.
    pub extractors: ExtractorSettings,
}

impl AppConfig {
    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        default_config_path()
    }

    /// Loads `path` (or the default path), applies environment overrides,
    /// and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let path = path.map_or_else(Self::default_path, Path::to_path_buf);
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a specific path without overrides.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;

        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Saves configuration to `path` (owner-only permissions).
    pub async fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self).await?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Applies `MEDIAFETCH_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = var("EXTRACTOR_BIN") {
            self.extractors.native.binary = v;
        }
        if let Some(v) = var("BROWSER_BIN") {
            self.browser.executable = Some(PathBuf::from(v));
        }
        if let Some(v) = var("PROXIES") {
            self.proxies.addresses = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("MAX_CONCURRENT") {
            self.jobs.max_concurrent = parse_env("MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = var("PER_CLIENT_LIMIT") {
            let limit: usize = parse_env("PER_CLIENT_LIMIT", &v)?;
            self.jobs.per_client_limit = (limit > 0).then_some(limit);
        }
        if let Some(v) = var("SUBMIT_LIMIT") {
            self.jobs.submit_limit = parse_env("SUBMIT_LIMIT", &v)?;
        }
        if let Some(v) = var("CLIENT_SUBMIT_LIMIT") {
            self.jobs.client_submit_limit = parse_env("CLIENT_SUBMIT_LIMIT", &v)?;
        }
        if let Some(v) = var("ATTEMPT_TIMEOUT_SECS") {
            self.jobs.attempt_timeout_secs = parse_env("ATTEMPT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("JOB_TIMEOUT_SECS") {
            self.jobs.job_timeout_secs = parse_env("JOB_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("ARTIFACT_DIR") {
            self.artifacts.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("ARTIFACT_TTL_SECS") {
            self.artifacts.ttl_secs = parse_env("ARTIFACT_TTL_SECS", &v)?;
        }
        if let Some(v) = var("REMOTE_API_URL") {
            self.extractors.remote.endpoint = Some(v);
        }
        if let Some(v) = var("REMOTE_API_KEY") {
            self.extractors.remote.api_key = Some(v);
        }
        if let Some(v) = var("STRICT_URLS") {
            self.classifier.strict = parse_bool("STRICT_URLS", &v)?;
        }
        if let Some(v) = var("HOST") {
            self.server.host = v;
        }
        if let Some(v) = var("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        Ok(())
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), StoreError> {
        let jobs = &self.jobs;
        if jobs.max_concurrent == 0 {
            return Err(StoreError::Config("jobs.maxConcurrent must be at least 1".into()));
        }
        if jobs.per_client_limit == Some(0) {
            return Err(StoreError::Config(
                "jobs.perClientLimit must be at least 1 (omit it for no limit)".into(),
            ));
        }
        if jobs.attempt_timeout_secs == 0 {
            return Err(StoreError::Config("jobs.attemptTimeoutSecs must be positive".into()));
        }
        if jobs.job_timeout_secs <= jobs.attempt_timeout_secs {
            return Err(StoreError::Config(format!(
                "jobs.jobTimeoutSecs ({}) must exceed jobs.attemptTimeoutSecs ({})",
                jobs.job_timeout_secs, jobs.attempt_timeout_secs
            )));
        }
        if (jobs.submit_limit > 0 || jobs.client_submit_limit > 0) && jobs.submit_window_secs == 0 {
            return Err(StoreError::Config("jobs.submitWindowSecs must be positive".into()));
        }
        if self.artifacts.ttl_secs == 0 {
            return Err(StoreError::Config("artifacts.ttlSecs must be positive".into()));
        }
        if self.proxies.base_backoff_secs > self.proxies.max_backoff_secs {
            return Err(StoreError::Config(
                "proxies.baseBackoffSecs must not exceed proxies.maxBackoffSecs".into(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Derived Values
    // ========================================================================

    /// Artifact directory, resolved.
    pub fn artifact_dir(&self) -> PathBuf {
        self.artifacts.dir.clone().unwrap_or_else(default_artifact_dir)
    }

    /// Artifact TTL.
    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifacts.ttl_secs)
    }

    /// Artifact sweep interval.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.artifacts.sweep_interval_secs.max(1))
    }

    /// Per-attempt timeout.
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.jobs.attempt_timeout_secs)
    }

    /// Janitor interval.
    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.jobs.janitor_interval_secs.max(1))
    }

    /// Settings for the job coordinator.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let jobs = &self.jobs;
        CoordinatorConfig {
            max_concurrent: jobs.max_concurrent,
            per_client_limit: jobs.per_client_limit,
            job_timeout: Duration::from_secs(jobs.job_timeout_secs),
            retention: Duration::from_secs(jobs.retention_secs),
            submit_limit: jobs.submit_rate(jobs.submit_limit),
            client_submit_limit: jobs.submit_rate(jobs.client_submit_limit),
            strict_urls: self.classifier.strict,
        }
    }

    /// Builds the proxy pool.
    pub fn proxy_pool(&self) -> ProxyPool {
        let backoff = Backoff::default()
            .with_base(Duration::from_secs(self.proxies.base_backoff_secs))
            .with_max(Duration::from_secs(self.proxies.max_backoff_secs));
        ProxyPool::new(self.proxies.addresses.iter().cloned()).with_backoff(backoff)
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| StoreError::Config(format!("{ENV_PREFIX}{name}={value:?}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, StoreError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StoreError::Config(format!(
            "{ENV_PREFIX}{name}={value:?}: expected true or false"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert!(config.classifier.strict);
        assert_eq!(config.extractors.native.binary, "yt-dlp");
        assert!(config.jobs.job_timeout_secs > config.jobs.attempt_timeout_secs);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("EXTRACTOR_BIN", "/opt/bin/yt-dlp"),
                ("BROWSER_BIN", "/usr/bin/chromium"),
                ("PROXIES", "http://a:1, socks5://b:2,,"),
                ("MAX_CONCURRENT", "8"),
                ("PER_CLIENT_LIMIT", "0"),
                ("SUBMIT_LIMIT", "100"),
                ("CLIENT_SUBMIT_LIMIT", "5"),
                ("ATTEMPT_TIMEOUT_SECS", "30"),
                ("JOB_TIMEOUT_SECS", "90"),
                ("ARTIFACT_DIR", "/srv/media"),
                ("ARTIFACT_TTL_SECS", "60"),
                ("REMOTE_API_URL", "https://api.test/extract"),
                ("REMOTE_API_KEY", "secret"),
                ("STRICT_URLS", "false"),
                ("HOST", "0.0.0.0"),
                ("PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.extractors.native.binary, "/opt/bin/yt-dlp");
        assert_eq!(config.browser.executable, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(config.proxies.addresses, vec!["http://a:1", "socks5://b:2"]);
        assert_eq!(config.jobs.max_concurrent, 8);
        assert_eq!(config.jobs.per_client_limit, None);
        assert_eq!(config.jobs.submit_limit, 100);
        assert_eq!(config.jobs.client_submit_limit, 5);
        assert_eq!(config.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(config.jobs.job_timeout_secs, 90);
        assert_eq!(config.artifact_dir(), PathBuf::from("/srv/media"));
        assert_eq!(config.artifact_ttl(), Duration::from_secs(60));
        assert!(config.extractors.remote.is_configured());
        assert_eq!(config.extractors.remote.api_key.as_deref(), Some("secret"));
        assert!(!config.classifier.strict);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("MEDIAFETCH_PORT"));

        let err = config.apply_env(env(&[("STRICT_URLS", "maybe")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_timeouts() {
        let mut config = AppConfig::default();
        config.jobs.job_timeout_secs = config.jobs.attempt_timeout_secs;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.jobs.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"jobs": {"maxConcurrent": 2}, "proxies": {"addresses": ["http://p:1"]}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.jobs.max_concurrent, 2);
        assert_eq!(config.jobs.attempt_timeout_secs, 120);
        assert_eq!(config.proxy_pool().len(), 1);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.server.port = 7070;
        config.save_to(&path).await.unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_coordinator_config() {
        let mut config = AppConfig::default();
        config.jobs.submit_limit = 0;
        let coord = config.coordinator_config();
        assert!(coord.submit_limit.is_none());
        assert!(coord.client_submit_limit.is_none());
        assert_eq!(coord.max_concurrent, 4);
        assert_eq!(coord.job_timeout, Duration::from_secs(600));
        assert!(coord.strict_urls);

        config.jobs.submit_limit = 10;
        config.jobs.client_submit_limit = 2;
        let coord = config.coordinator_config();
        assert_eq!(
            coord.submit_limit,
            Some(RateLimit {
                max_requests: 10,
                window: Duration::from_secs(60),
            })
        );
        assert_eq!(coord.client_submit_limit.map(|l| l.max_requests), Some(2));
    }
}
