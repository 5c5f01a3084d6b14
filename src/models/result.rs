// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Serialize};

use super::{JobId, Progress, TaskId};

/// Findings of a terminated remote scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Payload of the data endpoint as returned by the remote service
    pub data: serde_json::Value,
    /// Log lines in the order the remote service reported them
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Terminated,
    Cancelled,
}

/// Returned by a successful run of a job.
///
/// Failed runs are reported as errors instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub job_id: JobId,
    pub task_id: Option<TaskId>,
    pub status: TerminalStatus,
    pub progress: Progress,
    /// Only set when the status is terminated
    pub result: Option<ScanResult>,
}
