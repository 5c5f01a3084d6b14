// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ScanConfiguration, ScanResult};

/// Identifies a job within the queue.
pub type JobId = String;
/// Identifies a task on the remote scanning service.
pub type TaskId = String;

/// Enum of the possible states of a scan job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// The job waits for a worker
    #[default]
    Queued,
    /// Options are sent to the remote task
    Configuring,
    /// The remote scan is being started
    Starting,
    /// The remote scan is running and polled
    Running,
    /// The remote scan finished and the result was collected
    Terminated,
    /// The attempt failed and no retry is left
    Failed,
    /// The job was cancelled by a client
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed | Self::Cancelled)
    }

    /// Returns true while a worker owns the job.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Configuring | Self::Starting | Self::Running)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (current, _) if current.is_terminal() => false,
            (Queued, Configuring)
            | (Configuring, Starting)
            | (Starting, Running)
            | (Running, Terminated) => true,
            (_, Failed) | (_, Cancelled) => true,
            _ => false,
        }
    }
}

impl FromStr for JobState {
    type Err = ();

    fn from_str(state: &str) -> Result<JobState, ()> {
        match state {
            "queued" => Ok(JobState::Queued),
            "configuring" => Ok(JobState::Configuring),
            "starting" => Ok(JobState::Starting),
            "running" => Ok(JobState::Running),
            "terminated" => Ok(JobState::Terminated),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            _ => Err(()),
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Configuring => write!(f, "configuring"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Progress of a job in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Progress(f64);

impl Progress {
    pub const DONE: Progress = Progress(100.0);

    /// Creates a progress clamped into 0..=100. NaN becomes 0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 100.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Raises the progress to `other`.
    ///
    /// Returns false and keeps the current value when `other` is not higher.
    pub fn advance(&mut self, other: Progress) -> bool {
        if other.0 > self.0 {
            self.0 = other.0;
            true
        } else {
            false
        }
    }
}

impl From<f64> for Progress {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Additional information given on submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Application,
    Configuration,
    Start,
    Timeout,
    Internal,
}

/// Error stored on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

/// A change of a job published while it is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    TaskAssigned(TaskId),
    State(JobState),
    Progress(Progress),
}

/// A scan request tracked from submission to its terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub id: JobId,
    pub config: ScanConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
    pub task_id: Option<TaskId>,
    pub state: JobState,
    pub progress: Progress,
    /// Starts with 1, each retry is a new attempt.
    pub attempt: u32,
    pub result: Option<ScanResult>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanJob {
    pub fn new(config: ScanConfiguration, metadata: Option<JobMetadata>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            metadata,
            task_id: None,
            state: JobState::Queued,
            progress: Progress::default(),
            attempt: 1,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Moves the job into `next`.
    ///
    /// Invalid transitions are logged and ignored.
    pub fn transition(&mut self, next: JobState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!(
                job_id = %self.id,
                from = %self.state,
                to = %next,
                "ignoring invalid state transition"
            );
            return false;
        }
        if self.state == JobState::Queued && next.is_active() {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.state = next;
        true
    }

    /// Applies an event and returns true when it changed the job.
    pub fn apply(&mut self, event: &JobEvent) -> bool {
        match event {
            JobEvent::TaskAssigned(task_id) => match &self.task_id {
                None => {
                    self.task_id = Some(task_id.clone());
                    true
                }
                Some(current) if current == task_id => false,
                Some(current) => {
                    tracing::warn!(
                        job_id = %self.id,
                        %current,
                        rejected = %task_id,
                        "remote task id is already assigned"
                    );
                    false
                }
            },
            JobEvent::State(state) => self.transition(*state),
            JobEvent::Progress(progress) => {
                if self.state.is_terminal() && *progress != Progress::DONE {
                    return false;
                }
                self.progress.advance(*progress)
            }
        }
    }

    /// Resets the job for a new attempt.
    ///
    /// The remote task of the previous attempt is forgotten, it has been cleaned up by then.
    pub fn retry(&mut self) {
        self.attempt += 1;
        self.task_id = None;
        self.state = JobState::Queued;
        self.progress = Progress::default();
        self.result = None;
        self.error = None;
        self.started_at = None;
        self.finished_at = None;
    }
}
