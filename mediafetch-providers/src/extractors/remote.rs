//! Remote extraction API.
//!
//! One JSON POST `{url, quality}` to a configured endpoint; the response
//! carries the direct media URL in a configurable field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use mediafetch_core::ExtractorKind;
use mediafetch_fetch::{
    AttemptScope, ExtractContext, ExtractError, ExtractRequest, ExtractedMedia, Extractor,
    ResponseExt,
};

use super::diagnostics::summarize;

/// Identifier of the remote API extractor.
pub const REMOTE_EXTRACTOR_ID: &str = "remote.api";

// ============================================================================
// Config
// ============================================================================

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteApiConfig {
    /// Endpoint URL. The extractor is unavailable without one.
    pub endpoint: Option<String>,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Dotted path of the media URL in the response body.
    pub response_field: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Whether calls go through the proxy pool.
    pub use_proxy: bool,
}

impl Default for RemoteApiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            response_field: "url".to_string(),
            timeout_secs: 60,
            use_proxy: false,
        }
    }
}

impl RemoteApiConfig {
    /// Returns true if an endpoint is set.
    pub fn is_configured(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

// ============================================================================
// Extractor
// ============================================================================

/// Extractor that delegates to a remote extraction service.
#[derive(Debug, Clone, Default)]
pub struct RemoteApiExtractor {
    config: RemoteApiConfig,
}

impl RemoteApiExtractor {
    /// Creates an extractor from settings.
    pub fn new(config: RemoteApiConfig) -> Self {
        Self { config }
    }

    async fn call(
        &self,
        endpoint: &str,
        request: &ExtractRequest,
        scope: &AttemptScope,
        ctx: &ExtractContext,
    ) -> Result<ExtractedMedia, ExtractError> {
        let body = json!({
            "url": request.url,
            "quality": request.quality.to_string(),
        });
        let timeout = Duration::from_secs(self.config.timeout_secs).min(scope.timeout);

        let response = ctx
            .http
            .post_json(
                endpoint,
                &body,
                self.config.api_key.as_deref(),
                scope.proxy.as_deref(),
                timeout,
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response.retry_after_secs();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, &text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ExtractError::Transient(format!("invalid response body: {e}")))?;
        media_from_body(&value, &self.config.response_field)
    }
}

#[async_trait]
impl Extractor for RemoteApiExtractor {
    fn id(&self) -> &str {
        REMOTE_EXTRACTOR_ID
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::RemoteApi
    }

    fn uses_proxy(&self) -> bool {
        self.config.use_proxy
    }

    async fn is_available(&self, _ctx: &ExtractContext) -> bool {
        self.config.is_configured()
    }

    #[instrument(skip(self, scope, ctx), fields(extractor = REMOTE_EXTRACTOR_ID, url = %request.url))]
    async fn extract(
        &self,
        request: &ExtractRequest,
        scope: &AttemptScope,
        ctx: &ExtractContext,
    ) -> Result<ExtractedMedia, ExtractError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| ExtractError::Fatal("remote API endpoint is not configured".into()))?;

        tokio::select! {
            result = self.call(endpoint, request, scope, ctx) => result,
            () = scope.cancel.cancelled() => {
                debug!("Remote API call cancelled");
                Err(ExtractError::Cancelled)
            }
        }
    }
}

// ============================================================================
// Response Mapping
// ============================================================================

/// Maps a non-success status onto an extraction error.
pub fn classify_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> ExtractError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", summarize(body))
    };

    match status.as_u16() {
        429 => ExtractError::RateLimited {
            retry_after,
            detail,
        },
        401 | 403 => ExtractError::Blocked(detail),
        404 | 410 => ExtractError::NotFound(detail),
        400..=499 => ExtractError::Fatal(detail),
        _ => ExtractError::Transient(detail),
    }
}

/// Reads the media URL at the dotted `field` path.
pub fn media_from_body(body: &Value, field: &str) -> Result<ExtractedMedia, ExtractError> {
    let found = field
        .split('.')
        .filter(|s| !s.is_empty())
        .try_fold(body, |v, key| v.get(key));

    match found.and_then(Value::as_str).map(str::trim) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            Ok(ExtractedMedia::RemoteUrl(url.to_string()))
        }
        _ => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no media URL in response");
            Err(ExtractError::Transient(format!("`{field}`: {message}")))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
