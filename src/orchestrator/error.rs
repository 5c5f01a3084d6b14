// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Display;

use crate::models::{ErrorKind, JobError, TaskId, scanner};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Reason an attempt of a job failed
pub enum RunError {
    #[error("unable to configure task {task_id}: {message}")]
    /// The remote service rejected the options
    Configuration { task_id: TaskId, message: String },
    #[error("unable to start task {task_id}: {message}")]
    /// The remote service did not acknowledge the start
    Start { task_id: TaskId, message: String },
    #[error("task {task_id} did not terminate within {ticks} status checks")]
    /// The poll loop exhausted its ticks
    Timeout { task_id: TaskId, ticks: u32 },
    #[error("{0}")]
    /// A remote call failed
    Remote(#[from] scanner::Error),
}

impl RunError {
    /// Maps a failed set options call.
    ///
    /// Transport failures stay retryable.
    pub(crate) fn configuration(task_id: &str, error: scanner::Error) -> Self {
        match error {
            scanner::Error::Application(message) | scanner::Error::InvalidResponse(message) => {
                Self::Configuration {
                    task_id: task_id.to_owned(),
                    message,
                }
            }
            transport => Self::Remote(transport),
        }
    }

    /// Maps a failed start call.
    pub(crate) fn start(task_id: &str, error: scanner::Error) -> Self {
        match error {
            scanner::Error::Application(message) | scanner::Error::InvalidResponse(message) => {
                Self::Start {
                    task_id: task_id.to_owned(),
                    message,
                }
            }
            transport => Self::Remote(transport),
        }
    }

    /// Returns true when a new attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(error) => error.is_retryable(),
            Self::Configuration { .. } | Self::Start { .. } | Self::Timeout { .. } => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Start { .. } => ErrorKind::Start,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Remote(scanner::Error::Transport(_)) => ErrorKind::Transport,
            Self::Remote(scanner::Error::Application(_)) => ErrorKind::Application,
            Self::Remote(scanner::Error::InvalidResponse(_)) => ErrorKind::Internal,
        }
    }
}

impl From<&RunError> for JobError {
    fn from(error: &RunError) -> Self {
        JobError {
            kind: error.kind(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStep {
    Stop,
    Kill,
    Delete,
}

impl Display for CleanupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Kill => write!(f, "kill"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unable to {step} task {task_id}: {source}")]
/// A failed cleanup step, only ever logged
pub struct CleanupError {
    pub step: CleanupStep,
    pub task_id: TaskId,
    pub source: scanner::Error,
}
