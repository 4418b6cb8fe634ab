//! Sliding-window submission rate limit.
//!
//! Every submission counts against one global window. An optional second
//! window applies per client key on top of it.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// At most `max_requests` submissions per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Submissions allowed inside one window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimit {
    fn is_active(self) -> bool {
        self.max_requests > 0
    }

    /// Drops expired hits, then returns the wait until a slot frees up
    /// when the window is full.
    fn wait(self, hits: &mut VecDeque<Instant>, now: Instant) -> Option<Duration> {
        while hits
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            hits.pop_front();
        }
        if hits.len() < self.max_requests as usize {
            return None;
        }
        let oldest = hits.front().copied().unwrap_or(now);
        Some(self.window.saturating_sub(now.duration_since(oldest)))
    }
}

/// Tracks recent submissions globally and per client key.
#[derive(Debug, Default)]
pub(crate) struct SubmissionLimiter {
    global: Option<RateLimit>,
    per_client: Option<RateLimit>,
    global_hits: VecDeque<Instant>,
    client_hits: HashMap<String, VecDeque<Instant>>,
}

impl SubmissionLimiter {
    pub(crate) fn new(global: Option<RateLimit>, per_client: Option<RateLimit>) -> Self {
        Self {
            global: global.filter(|l| l.is_active()),
            per_client: per_client.filter(|l| l.is_active()),
            global_hits: VecDeque::new(),
            client_hits: HashMap::new(),
        }
    }

    pub(crate) fn check(&mut self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    /// Records a submission at `now`, or returns how long until both
    /// windows have a free slot. Rejected submissions are not recorded.
    pub(crate) fn check_at(&mut self, key: &str, now: Instant) -> Result<(), Duration> {
        let global_wait = self
            .global
            .and_then(|limit| limit.wait(&mut self.global_hits, now));

        let client_wait = match self.per_client {
            Some(limit) => {
                self.client_hits.retain(|_, times| {
                    times
                        .back()
                        .is_some_and(|t| now.duration_since(*t) < limit.window)
                });
                let times = self.client_hits.entry(key.to_string()).or_default();
                limit.wait(times, now)
            }
            None => None,
        };

        if let Some(wait) = global_wait.max(client_wait) {
            return Err(wait);
        }

        if self.global.is_some() {
            self.global_hits.push_back(now);
        }
        if self.per_client.is_some() {
            self.client_hits
                .entry(key.to_string())
                .or_default()
                .push_back(now);
        }
        Ok(())
    }
}
