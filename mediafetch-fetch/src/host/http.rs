//! HTTP client with tracing and per-proxy clients.
//!
//! reqwest binds the proxy at client construction, so one client is built
//! lazily per proxy address and reused for connection pooling.

use reqwest::{Client, Proxy, Response, header};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for `MediaFetch`.
const USER_AGENT: &str = concat!("MediaFetch/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and proxy support.
#[derive(Debug)]
pub struct HttpClient {
    direct: Client,
    timeout: Duration,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built. This should only occur
    /// if the system's TLS configuration is fundamentally broken, making
    /// network operations impossible.
    pub fn with_timeout(timeout: Duration) -> Self {
        let direct = Self::builder(timeout).build().unwrap_or_else(|e| {
            panic!(
                "Failed to create HTTP client: {e}. \
                This usually indicates a broken TLS configuration."
            )
        });

        Self {
            direct,
            timeout,
            proxied: Mutex::new(HashMap::new()),
        }
    }

    fn builder(timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder().timeout(timeout).user_agent(USER_AGENT)
    }

    /// Returns the client to use for `proxy` (`None` = direct).
    pub fn client_for(&self, proxy: Option<&str>) -> Result<Client, HttpError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut cache = self
            .proxied
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = cache.get(proxy) {
            return Ok(client.clone());
        }

        let client = Self::builder(self.timeout)
            .proxy(Proxy::all(proxy).map_err(|e| HttpError::InvalidProxy(format!("{proxy}: {e}")))?)
            .build()?;
        cache.insert(proxy.to_string(), client.clone());
        debug!(proxy = %proxy, "Built proxied HTTP client");
        Ok(client)
    }

    /// Performs a POST request with a JSON body.
    #[instrument(skip(self, body, bearer), fields(url = %url, proxied = proxy.is_some()))]
    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> Result<Response, HttpError> {
        Url::parse(url).map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;
        debug!("POST request with JSON");

        let mut request = self.client_for(proxy)?.post(url).timeout(timeout).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
pub trait ResponseExt {
    /// Check if the response indicates rate limiting.
    fn is_rate_limited(&self) -> bool;

    /// Get the Retry-After header value in seconds.
    fn retry_after_secs(&self) -> Option<u64>;
}

impl ResponseExt for Response {
    fn is_rate_limited(&self) -> bool {
        self.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
    }

    fn retry_after_secs(&self) -> Option<u64> {
        self.headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }
}

// ============================================================================
// Tests
// ============================================================================
