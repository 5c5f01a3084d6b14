// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{Notify, RwLock},
    time::{self, Instant},
};

use super::{Error, JobQueue, QueueSettings, QueueStats, StateFilter};
use crate::{
    models::{
        JobEvent, JobId, JobMetadata, JobState, ScanConfiguration, ScanJob, ScanOutcome,
        ScanResult,
    },
    orchestrator::{JobRecord, RunError},
};

/// Availability of retries whose backoff exceeds the range of [Instant].
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

struct Entry {
    job: ScanJob,
    cancel_requested: bool,
    available_at: Instant,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<JobId, Entry>,
    /// Ids of queued jobs in the order they are handed out
    waiting: VecDeque<JobId>,
}

impl Jobs {
    /// Removes the first job available at `now` from the waiting list.
    ///
    /// When there is none the earliest time a delayed job becomes available is returned.
    fn take_available(&mut self, now: Instant) -> Result<ScanJob, Option<Instant>> {
        let mut earliest: Option<Instant> = None;
        let mut available = None;
        for (index, id) in self.waiting.iter().enumerate() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            if entry.available_at <= now {
                available = Some((index, entry.job.clone()));
                break;
            }
            earliest = Some(match earliest {
                Some(at) if at <= entry.available_at => at,
                _ => entry.available_at,
            });
        }
        match available {
            Some((index, job)) => {
                self.waiting.remove(index);
                Ok(job)
            }
            None => Err(earliest),
        }
    }

    /// Removes the oldest finished jobs exceeding the retention limits.
    fn prune(&mut self, settings: &QueueSettings) {
        let limits = [
            (JobState::Terminated, settings.retain_completed),
            (JobState::Failed, settings.retain_failed),
            (JobState::Cancelled, settings.retain_failed),
        ];
        for (state, retain) in limits {
            if retain == 0 {
                continue;
            }
            let mut finished: Vec<_> = self
                .entries
                .values()
                .filter(|e| e.job.state == state)
                .map(|e| (e.job.finished_at, e.job.id.clone()))
                .collect();
            if finished.len() <= retain {
                continue;
            }
            finished.sort();
            let excess = finished.len() - retain;
            for (_, id) in finished.into_iter().take(excess) {
                tracing::debug!(job_id = %id, %state, "removing finished job");
                self.entries.remove(&id);
            }
        }
    }
}

/// Non durable queue keeping all jobs in memory.
pub struct InMemoryQueue {
    settings: QueueSettings,
    jobs: RwLock<Jobs>,
    available: Notify,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(QueueSettings::default())
    }
}

impl InMemoryQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            jobs: RwLock::new(Jobs::default()),
            available: Notify::new(),
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }
}

#[async_trait]
impl JobRecord for InMemoryQueue {
    async fn record(&self, id: &JobId, event: &JobEvent) {
        let mut jobs = self.jobs.write().await;
        match jobs.entries.get_mut(id) {
            Some(entry) => {
                entry.job.apply(event);
            }
            None => tracing::debug!(job_id = %id, ?event, "ignoring event of removed job"),
        }
    }

    async fn is_cancelled(&self, id: &JobId) -> bool {
        let jobs = self.jobs.read().await;
        jobs.entries
            .get(id)
            .map(|e| e.cancel_requested)
            .unwrap_or_default()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn submit(&self, config: ScanConfiguration, metadata: Option<JobMetadata>) -> JobId {
        let job = ScanJob::new(config, metadata);
        let id = job.id.clone();
        {
            let mut jobs = self.jobs.write().await;
            jobs.entries.insert(
                id.clone(),
                Entry {
                    job,
                    cancel_requested: false,
                    available_at: Instant::now(),
                },
            );
            jobs.waiting.push_back(id.clone());
        }
        tracing::info!(job_id = %id, "job queued");
        self.available.notify_one();
        id
    }

    async fn next(&self) -> ScanJob {
        loop {
            let wake_at = {
                let mut jobs = self.jobs.write().await;
                match jobs.take_available(Instant::now()) {
                    Ok(job) => {
                        tracing::debug!(job_id = %job.id, attempt = job.attempt, "job taken");
                        return job;
                    }
                    Err(wake_at) => wake_at,
                }
            };
            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = self.available.notified() => {}
                        _ = time::sleep_until(at) => {}
                    }
                }
                None => self.available.notified().await,
            }
        }
    }

    async fn finish(&self, job: ScanJob, result: &Result<ScanOutcome, RunError>) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.entries.get_mut(&job.id) else {
            tracing::warn!(job_id = %job.id, "finished job is unknown");
            return;
        };
        let retry = match result {
            Err(error) => {
                error.is_retryable()
                    && job.attempt < self.settings.max_attempts
                    && !entry.cancel_requested
            }
            Ok(_) => false,
        };
        if !retry {
            entry.job = job;
            jobs.prune(&self.settings);
            return;
        }

        let delay = self.settings.backoff_for(job.attempt);
        let mut job = job;
        job.retry();
        tracing::info!(
            job_id = %job.id,
            attempt = job.attempt,
            delay = ?delay,
            "retrying job"
        );
        let id = job.id.clone();
        entry.job = job;
        let now = Instant::now();
        entry.available_at = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);
        jobs.waiting.push_back(id);
        drop(jobs);
        self.available.notify_one();
    }

    async fn status(&self, id: &str) -> Result<ScanJob, Error> {
        let jobs = self.jobs.read().await;
        jobs.entries
            .get(id)
            .map(|e| e.job.clone())
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }

    async fn result(&self, id: &str) -> Result<ScanResult, Error> {
        let job = self.status(id).await?;
        match (job.state, job.result) {
            (JobState::Terminated, Some(result)) => Ok(result),
            (state, _) => Err(Error::NotCompleted(job.id, state)),
        }
    }

    async fn cancel(&self, id: &str) -> Result<JobState, Error> {
        let mut jobs = self.jobs.write().await;
        let waiting = jobs.waiting.iter().position(|w| w == id);
        let entry = jobs
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        if entry.job.state.is_terminal() {
            return Ok(entry.job.state);
        }
        entry.cancel_requested = true;
        match waiting {
            Some(index) => {
                entry.job.transition(JobState::Cancelled);
                jobs.waiting.remove(index);
                jobs.prune(&self.settings);
                tracing::info!(job_id = id, "queued job cancelled");
                Ok(JobState::Cancelled)
            }
            None => {
                tracing::info!(job_id = id, "cancellation of running job requested");
                Ok(entry.job.state)
            }
        }
    }

    async fn list(&self, filter: Option<StateFilter>, limit: usize) -> Vec<ScanJob> {
        let jobs = self.jobs.read().await;
        let mut result: Vec<ScanJob> = jobs
            .entries
            .values()
            .filter(|e| filter.map(|f| f.matches(e.job.state)).unwrap_or(true))
            .map(|e| e.job.clone())
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result.truncate(limit);
        result
    }

    async fn stats(&self) -> QueueStats {
        let jobs = self.jobs.read().await;
        let mut stats = QueueStats::default();
        for entry in jobs.entries.values() {
            stats.count(entry.job.state);
        }
        stats
    }
}
