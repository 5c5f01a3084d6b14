// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Status of a task as reported by the remote scanning service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteStatus {
    Running,
    Terminated,
    /// Any other status, e.g. `not running` before the task was picked up
    Other(String),
}

impl RemoteStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl From<&str> for RemoteStatus {
    fn from(status: &str) -> Self {
        match status {
            "running" => Self::Running,
            "terminated" => Self::Terminated,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for RemoteStatus {
    fn from(status: String) -> Self {
        Self::from(status.as_str())
    }
}

impl From<RemoteStatus> for String {
    fn from(status: RemoteStatus) -> Self {
        status.to_string()
    }
}

impl Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
            Self::Other(status) => write!(f, "{status}"),
        }
    }
}
