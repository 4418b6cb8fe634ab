//! Egress proxy rotation with health tracking.
//!
//! The pool hands out proxies round-robin, skipping those cooling down after
//! failures. If every proxy is cooling down it falls back to plain
//! round-robin so jobs are never starved. An empty pool means "connect
//! directly".

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::retry::Backoff;

// ============================================================================
// Proxy Entry
// ============================================================================

/// One egress proxy and its health state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    /// Proxy URL (e.g. `http://10.0.0.1:8080`, `socks5://host:1080`).
    pub address: String,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// When the last failure was reported.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// The proxy is skipped until this instant.
    pub cooldown_until: Option<Instant>,
}

impl ProxyEntry {
    fn new(address: String) -> Self {
        Self {
            address,
            consecutive_failures: 0,
            last_failure_at: None,
            cooldown_until: None,
        }
    }

    /// Returns true if the proxy is cooling down at `now`.
    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }
}

/// Serializable view of a proxy's health.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyHealth {
    /// Proxy URL.
    pub address: String,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// When the last failure was reported.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Seconds of cooldown left, zero when healthy.
    pub cooldown_remaining_secs: u64,
}

// ============================================================================
// Proxy Pool
// ============================================================================

#[derive(Debug, Default)]
struct PoolInner {
    entries: Vec<ProxyEntry>,
    cursor: usize,
}

/// Shared, mutex-guarded proxy rotation.
#[derive(Debug)]
pub struct ProxyPool {
    inner: Mutex<PoolInner>,
    backoff: Backoff,
}

impl ProxyPool {
    /// Creates a pool from proxy addresses. Blank and duplicate entries are
    /// dropped.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<ProxyEntry> = Vec::new();
        for address in addresses {
            let address = address.into().trim().to_string();
            if address.is_empty() || entries.iter().any(|e| e.address == address) {
                continue;
            }
            entries.push(ProxyEntry::new(address));
        }

        Self {
            inner: Mutex::new(PoolInner { entries, cursor: 0 }),
            backoff: Backoff::default(),
        }
    }

    /// Creates an empty pool (direct connections only).
    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Sets the cooldown backoff.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the number of proxies.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if the pool has no proxies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the next proxy to use, or `None` for a direct connection.
    pub fn next(&self) -> Option<ProxyEntry> {
        self.next_at(Instant::now())
    }

    /// [`ProxyPool::next`] evaluated at an explicit instant.
    pub fn next_at(&self, now: Instant) -> Option<ProxyEntry> {
        let mut inner = self.lock();
        let len = inner.entries.len();
        if len == 0 {
            return None;
        }

        let start = inner.cursor % len;
        let idx = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| !inner.entries[i].in_cooldown(now))
            .unwrap_or_else(|| {
                debug!("All proxies cooling down, ignoring cooldown");
                start
            });

        inner.cursor = (idx + 1) % len;
        Some(inner.entries[idx].clone())
    }

    /// Records the outcome of an attempt that used `address`.
    pub fn report_outcome(&self, address: &str, success: bool) {
        self.report_outcome_at(address, success, Instant::now());
    }

    /// [`ProxyPool::report_outcome`] evaluated at an explicit instant.
    pub fn report_outcome_at(&self, address: &str, success: bool, now: Instant) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.iter_mut().find(|e| e.address == address) else {
            debug!(proxy = %address, "Outcome reported for unknown proxy");
            return;
        };

        if success {
            if entry.consecutive_failures > 0 {
                info!(proxy = %address, "Proxy recovered");
            }
            entry.consecutive_failures = 0;
            entry.cooldown_until = None;
        } else {
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
            entry.last_failure_at = Some(Utc::now());
            let cooldown = self.backoff.delay_for_failures(entry.consecutive_failures);
            entry.cooldown_until = Some(now + cooldown);
            warn!(
                proxy = %address,
                failures = entry.consecutive_failures,
                cooldown = ?cooldown,
                "Proxy failed, cooling down"
            );
        }
    }

    /// Returns the health of every proxy.
    pub fn snapshot(&self) -> Vec<ProxyHealth> {
        let now = Instant::now();
        self.lock()
            .entries
            .iter()
            .map(|e| ProxyHealth {
                address: e.address.clone(),
                consecutive_failures: e.consecutive_failures,
                last_failure_at: e.last_failure_at,
                cooldown_remaining_secs: e
                    .cooldown_until
                    .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
                    .as_secs(),
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProxyPool {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
