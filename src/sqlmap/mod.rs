// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! HTTP adapter for the REST API of a sqlmap server (`sqlmapapi.py -s`).
//!
//! The service is task oriented: a task is created, configured with a flat option map,
//! started and polled until it reports `terminated`. Afterwards data and log can be
//! fetched. Stop, kill and delete answer with an acknowledgement only.

mod response;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::models::{
    OptionMap, RemoteStatus, TaskId,
    scanner::{
        Error, ScanResultFetcher, ScanStarter, ScanStatusPoller, ScanStopper, TaskConfigurer,
        TaskCreator, TaskDeleter,
    },
};
use response::{Acknowledgement, DataResponse, LogResponse, NewTask, StatusResponse};

/// Drives tasks on a sqlmap server.
#[derive(Debug, Clone)]
pub struct SqlmapClient {
    base: String,
    client: reqwest::Client,
}

fn transport(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Transport(format!("request timed out: {error}"))
    } else if error.is_connect() {
        Error::Transport(format!("unable to connect: {error}"))
    } else {
        Error::Transport(error.to_string())
    }
}

impl SqlmapClient {
    /// Creates a client for the service listening on `address`, e.g. `http://localhost:8775`.
    pub fn new(address: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base: address.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get<T>(&self, path: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        tracing::trace!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::trace!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        Self::read(response).await
    }

    async fn read<T>(response: reqwest::Response) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let body = Self::body(response).await?;
        serde_json::from_slice(&body).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    async fn body(response: reqwest::Response) -> Result<Vec<u8>, Error> {
        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or_default();
            return Err(Error::Transport(format!("{} {reason}", status.as_u16())));
        }
        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }

    /// Calls a control endpoint whose answer is an acknowledgement only.
    ///
    /// A body that is not an acknowledgement is accepted.
    async fn acknowledge(&self, path: &str, action: &str) -> Result<(), Error> {
        tracing::trace!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        let body = Self::body(response).await?;
        match serde_json::from_slice::<Acknowledgement>(&body) {
            Ok(ack) => ack.reject_failure(action),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl TaskCreator for SqlmapClient {
    async fn create_task(&self) -> Result<TaskId, Error> {
        let task: NewTask = self.get("/task/new").await?;
        task.into_task_id()
    }
}

#[async_trait]
impl TaskConfigurer for SqlmapClient {
    async fn set_options(&self, id: &str, options: &OptionMap) -> Result<(), Error> {
        if options.is_empty() {
            tracing::debug!(task_id = id, "no options to set");
            return Ok(());
        }
        let ack: Acknowledgement = self.post(&format!("/option/{id}/set"), options).await?;
        ack.require_success("set options")
    }
}

#[async_trait]
impl ScanStarter for SqlmapClient {
    async fn start_scan(&self, id: &str) -> Result<(), Error> {
        let ack: Acknowledgement = self
            .post(&format!("/scan/{id}/start"), &serde_json::json!({}))
            .await?;
        ack.require_success("start scan")
    }
}

#[async_trait]
impl ScanStatusPoller for SqlmapClient {
    async fn scan_status(&self, id: &str) -> Result<RemoteStatus, Error> {
        let status: StatusResponse = self.get(&format!("/scan/{id}/status")).await?;
        status.into_status()
    }
}

#[async_trait]
impl ScanResultFetcher for SqlmapClient {
    async fn fetch_data(&self, id: &str) -> Result<serde_json::Value, Error> {
        let data: DataResponse = self.get(&format!("/scan/{id}/data")).await?;
        data.into_payload()
    }

    async fn fetch_log(&self, id: &str) -> Result<Vec<String>, Error> {
        let log: LogResponse = self.get(&format!("/scan/{id}/log")).await?;
        log.into_lines()
    }
}

#[async_trait]
impl ScanStopper for SqlmapClient {
    async fn stop_scan(&self, id: &str) -> Result<(), Error> {
        self.acknowledge(&format!("/scan/{id}/stop"), "stop scan").await
    }

    async fn kill_scan(&self, id: &str) -> Result<(), Error> {
        self.acknowledge(&format!("/scan/{id}/kill"), "kill scan").await
    }
}

#[async_trait]
impl TaskDeleter for SqlmapClient {
    async fn delete_task(&self, id: &str) -> Result<(), Error> {
        self.acknowledge(&format!("/task/{id}/delete"), "delete task").await
    }
}
