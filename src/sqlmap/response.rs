// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::Deserialize;

use crate::models::{RemoteStatus, TaskId, scanner::Error};

fn failure(action: &str, message: Option<String>) -> Error {
    Error::Application(format!(
        "Failed to {action}: {}",
        message.unwrap_or_else(|| "Unknown error".to_owned())
    ))
}

/// Response of `GET /task/new`
#[derive(Debug, Deserialize)]
pub struct NewTask {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    taskid: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl NewTask {
    pub fn into_task_id(self) -> Result<TaskId, Error> {
        if self.success == Some(false) {
            return Err(failure("create task", self.message));
        }
        match self.taskid {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(Error::Application("Failed to create task".to_owned())),
        }
    }
}

/// `{success, message}` as returned by most control calls
#[derive(Debug, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
}

impl Acknowledgement {
    /// Fails unless the service explicitly reported success.
    pub fn require_success(self, action: &str) -> Result<(), Error> {
        match self.success {
            Some(true) => Ok(()),
            _ => Err(failure(action, self.message)),
        }
    }

    /// Fails only when the service explicitly reported a failure.
    pub fn reject_failure(self, action: &str) -> Result<(), Error> {
        match self.success {
            Some(false) => Err(failure(action, self.message)),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    status: Option<RemoteStatus>,
    #[serde(default)]
    message: Option<String>,
}

impl StatusResponse {
    pub fn into_status(self) -> Result<RemoteStatus, Error> {
        if self.success == Some(false) {
            return Err(failure("get status", self.message));
        }
        self.status
            .ok_or_else(|| Error::InvalidResponse("status is missing".to_owned()))
    }
}

/// The data payload is kept as it is.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct DataResponse(serde_json::Value);

impl DataResponse {
    pub fn into_payload(self) -> Result<serde_json::Value, Error> {
        if self.0.get("success") == Some(&serde_json::Value::Bool(false)) {
            let message = self
                .0
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_owned());
            return Err(failure("get data", message));
        }
        Ok(self.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LogEntry {
    Line(String),
    Entry {
        #[serde(default)]
        datetime: Option<String>,
        #[serde(default)]
        level: Option<String>,
        message: String,
    },
}

impl From<LogEntry> for String {
    fn from(entry: LogEntry) -> Self {
        match entry {
            LogEntry::Line(line) => line,
            LogEntry::Entry {
                datetime,
                level,
                message,
            } => {
                let mut line = String::new();
                if let Some(datetime) = datetime {
                    line.push_str(&datetime);
                    line.push(' ');
                }
                if let Some(level) = level {
                    line.push_str(&format!("[{level}] "));
                }
                line.push_str(&message);
                line
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    log: Option<Vec<LogEntry>>,
    #[serde(default)]
    message: Option<String>,
}

impl LogResponse {
    pub fn into_lines(self) -> Result<Vec<String>, Error> {
        if self.success == Some(false) {
            return Err(failure("get log", self.message));
        }
        Ok(self
            .log
            .unwrap_or_default()
            .into_iter()
            .map(String::from)
            .collect())
    }
}
