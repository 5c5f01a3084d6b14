// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Overview of the structure of this module: The `Orchestrator` owns a
//! single attempt of a `ScanJob` from the moment a worker took it from
//! the queue until it reaches a terminal state. It acquires a task on
//! the remote scanning service, configures it with the options
//! produced by [crate::options], starts it and polls its status in a
//! fixed interval. Once the remote task terminated the data and log are
//! collected. Every change of the job is published through a
//! `JobRecord`, which is also asked for cancellation before each poll.
//!
//! Whenever an attempt fails or is cancelled after a remote task was
//! created, the task is stopped, killed and deleted. Failures while
//! doing so are only logged. Retrying a failed attempt is up to the
//! caller.

mod error;

pub use error::{CleanupError, CleanupStep, RunError};

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;

use crate::{
    models::{
        JobError, JobEvent, JobId, JobState, Progress, RemoteStatus, ScanJob, ScanOutcome,
        ScanResult, TaskId, TerminalStatus, scanner::RemoteScanner,
    },
    options,
};

const TASK_ACQUIRED: f64 = 10.0;
const CONFIGURED: f64 = 20.0;
const STARTED: f64 = 30.0;
const RUNNING_CEILING: f64 = 95.0;
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Estimated progress of a running remote scan after `tick` status checks.
pub fn running_progress(tick: u32) -> Progress {
    Progress::new((STARTED + f64::from(tick) * 0.1).min(RUNNING_CEILING))
}

/// Interval and number of status checks of a running remote scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_ticks: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_ticks: 1000,
        }
    }
}

/// Record of a job outside of the worker processing it.
#[async_trait]
pub trait JobRecord: Send + Sync {
    /// Publishes a change of a job.
    async fn record(&self, id: &JobId, event: &JobEvent);

    /// Returns true when a client asked to cancel the job.
    async fn is_cancelled(&self, id: &JobId) -> bool;
}

enum Finished {
    Terminated(ScanResult),
    Cancelled,
}

/// Drives jobs through the lifecycle of a remote task.
pub struct Orchestrator<S> {
    scanner: Arc<S>,
    settings: PollSettings,
}

impl<S> Orchestrator<S>
where
    S: RemoteScanner + 'static,
{
    pub fn new(scanner: Arc<S>, settings: PollSettings) -> Self {
        Self { scanner, settings }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Runs a single attempt of `job`.
    ///
    /// On return the job is in a terminal state, on failure it also carries the error.
    pub async fn run<R>(&self, job: &mut ScanJob, record: &R) -> Result<ScanOutcome, RunError>
    where
        R: JobRecord + ?Sized,
    {
        let span = tracing::info_span!(
            "scan_job",
            job_id = %job.id,
            attempt = job.attempt,
            task_id = tracing::field::Empty
        );
        self.drive(job, record).instrument(span).await
    }

    async fn drive<R>(&self, job: &mut ScanJob, record: &R) -> Result<ScanOutcome, RunError>
    where
        R: JobRecord + ?Sized,
    {
        match self.lifecycle(job, record).await {
            Ok(Finished::Terminated(result)) => {
                job.result = Some(result.clone());
                publish(job, record, JobEvent::Progress(Progress::DONE)).await;
                publish(job, record, JobEvent::State(JobState::Terminated)).await;
                tracing::info!(log_lines = result.log.len(), "scan terminated");
                Ok(outcome(job, TerminalStatus::Terminated, Some(result)))
            }
            Ok(Finished::Cancelled) => {
                if let Some(task_id) = job.task_id.clone() {
                    self.cleanup(&task_id).await;
                }
                publish(job, record, JobEvent::State(JobState::Cancelled)).await;
                tracing::info!("scan cancelled");
                Ok(outcome(job, TerminalStatus::Cancelled, None))
            }
            Err(error) => {
                tracing::warn!(%error, retryable = error.is_retryable(), "scan attempt failed");
                if let Some(task_id) = job.task_id.clone() {
                    self.cleanup(&task_id).await;
                }
                job.error = Some(JobError::from(&error));
                publish(job, record, JobEvent::State(JobState::Failed)).await;
                Err(error)
            }
        }
    }

    async fn lifecycle<R>(&self, job: &mut ScanJob, record: &R) -> Result<Finished, RunError>
    where
        R: JobRecord + ?Sized,
    {
        let task_id = match job.task_id.clone() {
            Some(task_id) => {
                tracing::debug!(%task_id, "reusing remote task of this attempt");
                task_id
            }
            None => {
                let task_id = self.scanner.create_task().await?;
                // A crash before this event is recorded leaves an orphaned remote task.
                publish(job, record, JobEvent::TaskAssigned(task_id.clone())).await;
                task_id
            }
        };
        tracing::Span::current().record("task_id", task_id.as_str());
        publish(job, record, JobEvent::Progress(TASK_ACQUIRED.into())).await;

        publish(job, record, JobEvent::State(JobState::Configuring)).await;
        let options = options::to_remote_options(&job.config);
        tracing::debug!(options = options.len(), "configuring remote task");
        self.scanner
            .set_options(&task_id, &options)
            .await
            .map_err(|e| RunError::configuration(&task_id, e))?;
        publish(job, record, JobEvent::Progress(CONFIGURED.into())).await;

        publish(job, record, JobEvent::State(JobState::Starting)).await;
        self.scanner
            .start_scan(&task_id)
            .await
            .map_err(|e| RunError::start(&task_id, e))?;
        publish(job, record, JobEvent::Progress(STARTED.into())).await;
        publish(job, record, JobEvent::State(JobState::Running)).await;
        tracing::info!("remote scan started");

        self.poll(job, record, &task_id).await
    }

    async fn poll<R>(
        &self,
        job: &mut ScanJob,
        record: &R,
        task_id: &TaskId,
    ) -> Result<Finished, RunError>
    where
        R: JobRecord + ?Sized,
    {
        let mut interval = time::interval(self.settings.interval.max(MIN_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for tick in 0..self.settings.max_ticks {
            interval.tick().await;
            if record.is_cancelled(&job.id).await {
                tracing::info!(tick, "cancellation requested");
                return Ok(Finished::Cancelled);
            }
            match self.scanner.scan_status(task_id).await? {
                RemoteStatus::Terminated => {
                    tracing::debug!(tick, "remote scan terminated, collecting result");
                    let data = self.scanner.fetch_data(task_id).await?;
                    let log = self.scanner.fetch_log(task_id).await?;
                    return Ok(Finished::Terminated(ScanResult { data, log }));
                }
                RemoteStatus::Running => {
                    publish(job, record, JobEvent::Progress(running_progress(tick))).await;
                    tracing::trace!(tick, progress = %job.progress, "remote scan running");
                }
                RemoteStatus::Other(status) => {
                    tracing::debug!(tick, %status, "remote scan not running");
                }
            }
        }
        Err(RunError::Timeout {
            task_id: task_id.clone(),
            ticks: self.settings.max_ticks,
        })
    }

    /// Stops, kills and deletes a remote task.
    ///
    /// Each step is attempted regardless of the previous ones.
    async fn cleanup(&self, task_id: &str) {
        for step in [CleanupStep::Stop, CleanupStep::Kill, CleanupStep::Delete] {
            let result = match step {
                CleanupStep::Stop => self.scanner.stop_scan(task_id).await,
                CleanupStep::Kill => self.scanner.kill_scan(task_id).await,
                CleanupStep::Delete => self.scanner.delete_task(task_id).await,
            };
            if let Err(source) = result {
                let error = CleanupError {
                    step,
                    task_id: task_id.to_owned(),
                    source,
                };
                tracing::warn!(%error, %step, "cleanup of remote task failed");
            }
        }
    }
}

/// Applies `event` to the job and publishes it when it changed the job.
async fn publish<R>(job: &mut ScanJob, record: &R, event: JobEvent)
where
    R: JobRecord + ?Sized,
{
    if job.apply(&event) {
        record.record(&job.id, &event).await;
    }
}

fn outcome(job: &ScanJob, status: TerminalStatus, result: Option<ScanResult>) -> ScanOutcome {
    ScanOutcome {
        job_id: job.id.clone(),
        task_id: job.task_id.clone(),
        status,
        progress: job.progress,
        result,
    }
}
