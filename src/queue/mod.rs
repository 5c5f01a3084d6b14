// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Queue handing jobs to workers and keeping their records for queries.
//!
//! Only a non durable [InMemoryQueue] is shipped. Jobs are handed out in submission order,
//! retries of failed attempts become available after their backoff elapsed.

mod memory;
#[cfg(test)]
mod tests;

pub use memory::InMemoryQueue;

use std::{fmt::Display, str::FromStr, time::Duration};

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    models::{JobId, JobMetadata, JobState, ScanConfiguration, ScanJob, ScanOutcome, ScanResult},
    orchestrator::{JobRecord, RunError},
};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Job not found: {0}")]
    NotFound(JobId),
    #[error("Job {0} is not completed yet, it is {1}")]
    NotCompleted(JobId, JobState),
}

/// Retry and retention policy of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Attempts of a job including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each further one
    pub backoff: Duration,
    /// Terminated jobs to keep, 0 keeps all
    pub retain_completed: usize,
    /// Failed jobs to keep, 0 keeps all
    pub retain_failed: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            retain_completed: 10,
            retain_failed: 5,
        }
    }
}

impl QueueSettings {
    /// Delay before `attempt` (the failed one) is retried.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1 << exponent)
    }
}

/// Groups of job states used to filter listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    Waiting,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl StateFilter {
    pub fn matches(&self, state: JobState) -> bool {
        match self {
            Self::Waiting => state == JobState::Queued,
            Self::Active => state.is_active(),
            Self::Completed => state == JobState::Terminated,
            Self::Failed => state == JobState::Failed,
            Self::Cancelled => state == JobState::Cancelled,
        }
    }
}

impl FromStr for StateFilter {
    type Err = ();

    fn from_str(filter: &str) -> Result<Self, ()> {
        match filter {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(()),
        }
    }
}

impl Display for StateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl QueueStats {
    pub(crate) fn count(&mut self, state: JobState) {
        match state {
            JobState::Queued => self.waiting += 1,
            JobState::Configuring | JobState::Starting | JobState::Running => self.active += 1,
            JobState::Terminated => self.completed += 1,
            JobState::Failed => self.failed += 1,
            JobState::Cancelled => self.cancelled += 1,
        }
        self.total += 1;
    }
}

/// Hands out jobs to workers and answers queries about them.
#[async_trait]
pub trait JobQueue: JobRecord {
    /// Stores a new job and returns its id.
    async fn submit(&self, config: ScanConfiguration, metadata: Option<JobMetadata>) -> JobId;

    /// Waits until a job is available and hands it to the caller exclusively.
    async fn next(&self) -> ScanJob;

    /// Stores the result of an attempt handed out by `next`.
    async fn finish(&self, job: ScanJob, result: &Result<ScanOutcome, RunError>);

    async fn status(&self, id: &str) -> Result<ScanJob, Error>;

    /// Returns the result of a terminated job.
    async fn result(&self, id: &str) -> Result<ScanResult, Error>;

    /// Cancels a job and returns its state afterwards.
    async fn cancel(&self, id: &str) -> Result<JobState, Error>;

    /// Returns up to `limit` jobs, most recent first.
    async fn list(&self, filter: Option<StateFilter>, limit: usize) -> Vec<ScanJob>;

    async fn stats(&self) -> QueueStats;
}
