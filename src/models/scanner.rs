// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use async_trait::async_trait;
use thiserror::Error;

use super::{OptionMap, RemoteStatus, TaskId};

/// Creates a task on the remote scanning service
#[async_trait]
pub trait TaskCreator {
    /// Creates a task and returns its id
    async fn create_task(&self) -> Result<TaskId, Error>;
}

/// Configures a task
#[async_trait]
pub trait TaskConfigurer {
    /// Sets the options of a task
    async fn set_options(&self, id: &str, options: &OptionMap) -> Result<(), Error>;
}

/// Starts a scan
#[async_trait]
pub trait ScanStarter {
    /// Starts the scan of a configured task
    async fn start_scan(&self, id: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait ScanStatusPoller {
    async fn scan_status(&self, id: &str) -> Result<RemoteStatus, Error>;
}

#[async_trait]
pub trait ScanResultFetcher {
    /// Fetches the findings of a terminated scan
    async fn fetch_data(&self, id: &str) -> Result<serde_json::Value, Error>;

    /// Fetches the log lines of a scan in order
    async fn fetch_log(&self, id: &str) -> Result<Vec<String>, Error>;
}

/// Stops a scan
#[async_trait]
pub trait ScanStopper {
    /// Asks the scan to stop
    async fn stop_scan(&self, id: &str) -> Result<(), Error>;

    /// Kills the scan process
    async fn kill_scan(&self, id: &str) -> Result<(), Error>;
}

/// Deletes a task
#[async_trait]
pub trait TaskDeleter {
    async fn delete_task(&self, id: &str) -> Result<(), Error>;
}

type Callback<T> = Box<dyn Fn(&str) -> Result<T, Error> + Sync + Send + 'static>;

/// Is a scanner implementation primarily for testing purposes.
///
/// It is holding call back functions so that it is easier to implement a scanner for testing
/// without having to copy and paste the async traits.
#[allow(clippy::complexity)]
pub struct Lambda {
    create: Box<dyn Fn() -> Result<TaskId, Error> + Sync + Send + 'static>,
    set_options: Box<dyn Fn(&str, &OptionMap) -> Result<(), Error> + Sync + Send + 'static>,
    start: Callback<()>,
    status: Callback<RemoteStatus>,
    data: Callback<serde_json::Value>,
    log: Callback<Vec<String>>,
    stop: Callback<()>,
    kill: Callback<()>,
    delete: Callback<()>,
}

impl Default for Lambda {
    fn default() -> Self {
        Self {
            create: Box::new(|| Ok("lambda".to_owned())),
            set_options: Box::new(|_, _| Ok(())),
            start: Box::new(|_| Ok(())),
            status: Box::new(|_| Ok(RemoteStatus::Terminated)),
            data: Box::new(|_| Ok(serde_json::Value::Null)),
            log: Box::new(|_| Ok(vec![])),
            stop: Box::new(|_| Ok(())),
            kill: Box::new(|_| Ok(())),
            delete: Box::new(|_| Ok(())),
        }
    }
}

/// Builds a Lambda scanner implementation.
pub struct LambdaBuilder {
    lambda: Lambda,
}

impl Default for LambdaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LambdaBuilder {
    pub fn new() -> Self {
        Self {
            lambda: Lambda::default(),
        }
    }

    pub fn with_create<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<TaskId, Error> + Sync + Send + 'static,
    {
        self.lambda.create = Box::new(f);
        self
    }

    pub fn with_set_options<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &OptionMap) -> Result<(), Error> + Sync + Send + 'static,
    {
        self.lambda.set_options = Box::new(f);
        self
    }

    pub fn with_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), Error> + Sync + Send + 'static,
    {
        self.lambda.start = Box::new(f);
        self
    }

    pub fn with_status<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<RemoteStatus, Error> + Sync + Send + 'static,
    {
        self.lambda.status = Box::new(f);
        self
    }

    pub fn with_data<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<serde_json::Value, Error> + Sync + Send + 'static,
    {
        self.lambda.data = Box::new(f);
        self
    }

    pub fn with_log<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<String>, Error> + Sync + Send + 'static,
    {
        self.lambda.log = Box::new(f);
        self
    }

    pub fn with_stop<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), Error> + Sync + Send + 'static,
    {
        self.lambda.stop = Box::new(f);
        self
    }

    pub fn with_kill<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), Error> + Sync + Send + 'static,
    {
        self.lambda.kill = Box::new(f);
        self
    }

    pub fn with_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), Error> + Sync + Send + 'static,
    {
        self.lambda.delete = Box::new(f);
        self
    }

    pub fn build(self) -> Lambda {
        self.lambda
    }
}

#[async_trait]
impl TaskCreator for Lambda {
    async fn create_task(&self) -> Result<TaskId, Error> {
        (self.create)()
    }
}

#[async_trait]
impl TaskConfigurer for Lambda {
    async fn set_options(&self, id: &str, options: &OptionMap) -> Result<(), Error> {
        (self.set_options)(id, options)
    }
}

#[async_trait]
impl ScanStarter for Lambda {
    async fn start_scan(&self, id: &str) -> Result<(), Error> {
        (self.start)(id)
    }
}

#[async_trait]
impl ScanStatusPoller for Lambda {
    async fn scan_status(&self, id: &str) -> Result<RemoteStatus, Error> {
        (self.status)(id)
    }
}

#[async_trait]
impl ScanResultFetcher for Lambda {
    async fn fetch_data(&self, id: &str) -> Result<serde_json::Value, Error> {
        (self.data)(id)
    }

    async fn fetch_log(&self, id: &str) -> Result<Vec<String>, Error> {
        (self.log)(id)
    }
}

#[async_trait]
impl ScanStopper for Lambda {
    async fn stop_scan(&self, id: &str) -> Result<(), Error> {
        (self.stop)(id)
    }

    async fn kill_scan(&self, id: &str) -> Result<(), Error> {
        (self.kill)(id)
    }
}

#[async_trait]
impl TaskDeleter for Lambda {
    async fn delete_task(&self, id: &str) -> Result<(), Error> {
        (self.delete)(id)
    }
}

/// Combines all traits needed to drive a remote scan.
pub trait RemoteScanner:
    TaskCreator
    + TaskConfigurer
    + ScanStarter
    + ScanStatusPoller
    + ScanResultFetcher
    + ScanStopper
    + TaskDeleter
    + Send
    + Sync
{
}

impl<T> RemoteScanner for T where
    T: TaskCreator
        + TaskConfigurer
        + ScanStarter
        + ScanStatusPoller
        + ScanResultFetcher
        + ScanStopper
        + TaskDeleter
        + Send
        + Sync
{
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The service was not reachable or answered with a non success HTTP status.
    #[error("Connection issue: {0}")]
    Transport(String),
    /// The service reported a failure.
    #[error("Remote service failure: {0}")]
    Application(String),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Returns true when repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
