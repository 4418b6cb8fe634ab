//! Job table: jobs by id, the admission queue, and the dedup index.
//!
//! Every method runs under the coordinator's single table lock, which is
//! what makes dedup lookup-then-insert atomic.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use mediafetch_core::{AttemptRecord, Job, JobFailure, JobId, JobState, MediaRef, Quality};

use super::JobStats;

/// Dedup key: normalized URL plus quality.
type Fingerprint = (String, Quality);

fn fingerprint(job: &Job) -> Fingerprint {
    (job.normalized_url.clone(), job.quality)
}

/// How a running job ended.
#[derive(Debug)]
pub(crate) enum Completion {
    Succeeded(MediaRef, Vec<AttemptRecord>),
    Failed(JobFailure, Vec<AttemptRecord>),
    Cancelled(Vec<AttemptRecord>),
}

struct Entry {
    job: Job,
    cancel: CancellationToken,
}

#[derive(Default)]
pub(crate) struct JobTable {
    jobs: HashMap<JobId, Entry>,
    queue: VecDeque<JobId>,
    active: HashMap<Fingerprint, JobId>,
    running: usize,
    running_by_client: HashMap<String, usize>,
}

impl JobTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id).map(|e| &e.job)
    }

    /// Inserts a queued job unless a non-terminal job shares its
    /// fingerprint. Returns the id to hand out and whether it is new.
    pub(crate) fn insert_or_existing(&mut self, job: Job, cancel: CancellationToken) -> (JobId, bool) {
        let key = fingerprint(&job);
        if let Some(existing) = self.active.get(&key) {
            return (existing.clone(), false);
        }

        let id = job.id.clone();
        self.active.insert(key, id.clone());
        self.queue.push_back(id.clone());
        self.jobs.insert(id.clone(), Entry { job, cancel });
        (id, true)
    }

    /// Starts the oldest queued job whose client is under its cap.
    pub(crate) fn admit_next(
        &mut self,
        max_running: usize,
        per_client: Option<usize>,
    ) -> Option<(Job, CancellationToken)> {
        if self.running >= max_running {
            return None;
        }

        let position = self.queue.iter().position(|id| {
            let client = self.jobs.get(id).and_then(|e| e.job.client_id.as_deref());
            match (client, per_client) {
                (Some(client), Some(limit)) => {
                    self.running_by_client.get(client).copied().unwrap_or(0) < limit
                }
                _ => true,
            }
        })?;
        let id = self.queue.remove(position)?;
        let entry = self.jobs.get_mut(&id)?;
        if !entry.job.start() {
            return None;
        }

        self.running += 1;
        if let Some(client) = &entry.job.client_id {
            *self.running_by_client.entry(client.clone()).or_default() += 1;
        }
        Some((entry.job.clone(), entry.cancel.clone()))
    }

    /// Applies a completion. Returns the new snapshot if the job moved.
    pub(crate) fn complete(&mut self, id: &JobId, completion: Completion) -> Option<Job> {
        let entry = self.jobs.get_mut(id)?;
        let was_running = entry.job.state == JobState::Running;
        let moved = match completion {
            Completion::Succeeded(media, attempts) => entry.job.succeed(media, attempts),
            Completion::Failed(failure, attempts) => entry.job.fail(failure, attempts),
            Completion::Cancelled(attempts) => entry.job.cancel(Some(attempts)),
        };
        if !moved {
            return None;
        }

        let job = entry.job.clone();
        self.release(&job, was_running);
        Some(job)
    }

    /// Cancels a job. Queued jobs end immediately; running jobs get their
    /// token fired and end when their task notices.
    ///
    /// Returns the snapshot and whether the state changed here.
    pub(crate) fn cancel(&mut self, id: &JobId) -> Option<(Job, bool)> {
        let entry = self.jobs.get_mut(id)?;
        match entry.job.state {
            JobState::Queued => {
                entry.job.cancel(None);
                let job = entry.job.clone();
                self.queue.retain(|queued| queued != id);
                self.release(&job, false);
                Some((job, true))
            }
            JobState::Running => {
                entry.cancel.cancel();
                Some((entry.job.clone(), false))
            }
            _ => Some((entry.job.clone(), false)),
        }
    }

    /// Cancels every queued job. Returns how many.
    pub(crate) fn cancel_queued(&mut self) -> usize {
        let ids: Vec<JobId> = self.queue.drain(..).collect();
        let mut count = 0;
        for id in ids {
            let Some(entry) = self.jobs.get_mut(&id) else {
                continue;
            };
            if entry.job.cancel(None) {
                let job = entry.job.clone();
                self.release(&job, false);
                count += 1;
            }
        }
        count
    }

    fn release(&mut self, job: &Job, was_running: bool) {
        let key = fingerprint(job);
        if self.active.get(&key) == Some(&job.id) {
            self.active.remove(&key);
        }
        if !was_running {
            return;
        }
        self.running = self.running.saturating_sub(1);
        if let Some(client) = &job.client_id {
            if let Some(count) = self.running_by_client.get_mut(client) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.running_by_client.remove(client);
                }
            }
        }
    }

    /// Drops terminal jobs that finished at least `retention` before `now`.
    pub(crate) fn evict_finished(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, entry| {
            let Some(finished_at) = entry.job.finished_at else {
                return true;
            };
            !entry.job.is_terminal()
                || (now - finished_at).to_std().unwrap_or_default() < retention
        });
        before - self.jobs.len()
    }

    pub(crate) fn stats(&self) -> JobStats {
        let mut stats = JobStats::default();
        for entry in self.jobs.values() {
            match entry.job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Running => stats.running += 1,
                JobState::Succeeded => stats.succeeded += 1,
                JobState::Failed => stats.failed += 1,
                JobState::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}
