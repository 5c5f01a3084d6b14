// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! HTTP interface to submit scans and query their jobs.
//!
//! | Method | Path                     | Description                               |
//! |--------|--------------------------|-------------------------------------------|
//! | POST   | /scan/start              | queues a scan and returns the job id      |
//! | GET    | /scan/status/{id}        | state, progress and result or error       |
//! | GET    | /scan/result/{id}        | result of a terminated job                |
//! | POST   | /scan/cancel/{id}        | cancels a job                             |
//! | GET    | /scan/queue/stats        | number of jobs per state                  |
//! | GET    | /scan/queue/jobs         | most recent jobs, `?status=&limit=`       |
//! | GET    | /health/alive            | returns 200 while the daemon is up        |

pub mod response;

use std::{collections::HashMap, convert::Infallible, net::SocketAddr, pin::Pin, sync::Arc};

use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::{Method, StatusCode, body::Bytes};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{
    models::{JobError, JobMetadata, JobState, ScanConfiguration, ScanJob, ScanResult},
    queue::{self, JobQueue, StateFilter},
};
use response::Reply;

const DEFAULT_LIMIT: usize = 10;

#[derive(Deserialize, Debug)]
struct Submission {
    #[serde(flatten)]
    config: ScanConfiguration,
    #[serde(default)]
    metadata: Option<JobMetadata>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
pub enum ErrorBody {
    Message(String),
    Job(JobError),
}

/// Response of the scan endpoints
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    /// The id of the job
    pub task_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScanResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ScanResponse {
    fn new<I, S>(task_id: I, status: S) -> Self
    where
        I: Into<String>,
        S: ToString,
    {
        Self {
            task_id: task_id.into(),
            status: status.to_string(),
            message: None,
            data: None,
            progress: None,
            error: None,
        }
    }

    fn not_found(id: &str) -> Reply {
        let mut response = Self::new(id, "not_found");
        response.error = Some(ErrorBody::Message("Job not found".to_owned()));
        Reply::json(StatusCode::NOT_FOUND, &response)
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub task_id: Option<String>,
    pub state: JobState,
    pub progress: f64,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<ScanJob> for JobSummary {
    fn from(job: ScanJob) -> Self {
        Self {
            id: job.id,
            task_id: job.task_id,
            state: job.state,
            progress: job.progress.value(),
            attempt: job.attempt,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

enum Route<'a> {
    Start,
    Status(&'a str),
    Result(&'a str),
    Cancel(&'a str),
    Stats,
    Jobs,
    Alive,
}

impl<'a> Route<'a> {
    fn parse(parts: &[&'a str]) -> Option<(Method, Self)> {
        match parts {
            ["scan", "start"] => Some((Method::POST, Self::Start)),
            ["scan", "status", id] => Some((Method::GET, Self::Status(*id))),
            ["scan", "result", id] => Some((Method::GET, Self::Result(*id))),
            ["scan", "cancel", id] => Some((Method::POST, Self::Cancel(*id))),
            ["scan", "queue", "stats"] => Some((Method::GET, Self::Stats)),
            ["scan", "queue", "jobs"] => Some((Method::GET, Self::Jobs)),
            ["health", "alive"] => Some((Method::GET, Self::Alive)),
            _ => None,
        }
    }
}

fn decode(value: &str) -> String {
    let value = value.replace('+', " ");
    match urlencoding::decode(&value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value,
    }
}

fn query_parameters(query: Option<&str>) -> HashMap<String, String> {
    query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let (key, value) = p.split_once('=').unwrap_or((p, ""));
            (decode(key), decode(value))
        })
        .collect()
}

/// Serves the requests of a single connection.
pub struct EntryPoint<Q> {
    queue: Arc<Q>,
}

impl<Q> Clone for EntryPoint<Q> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<Q> EntryPoint<Q>
where
    Q: JobQueue + 'static,
{
    pub fn new(queue: Arc<Q>) -> Self {
        Self { queue }
    }

    async fn handle<R>(queue: Arc<Q>, req: hyper::Request<R>) -> Reply
    where
        R: hyper::body::Body + Send + 'static,
        <R as hyper::body::Body>::Error: std::error::Error,
        <R as hyper::body::Body>::Data: Send,
    {
        let path = req.uri().path().to_owned();
        let parts = path
            .split('/')
            // handles double slashes e.g. /scan//status/
            .filter(|x| !x.is_empty())
            .collect::<Vec<_>>();
        let Some((method, route)) = Route::parse(&parts) else {
            return Reply::empty(StatusCode::NOT_FOUND);
        };
        if req.method() == Method::HEAD {
            return Reply::empty(StatusCode::OK);
        }
        if req.method() != method {
            return Reply::empty(StatusCode::METHOD_NOT_ALLOWED);
        }
        let query = query_parameters(req.uri().query());
        let body = match req.into_body().collect().await {
            Ok(x) => x.to_bytes(),
            Err(e) => return Reply::internal_error(e),
        };

        match route {
            Route::Start => Self::start(queue.as_ref(), body).await,
            Route::Status(id) => Self::status(queue.as_ref(), id).await,
            Route::Result(id) => Self::result(queue.as_ref(), id).await,
            Route::Cancel(id) => Self::cancel(queue.as_ref(), id).await,
            Route::Stats => Reply::json(StatusCode::OK, &queue.stats().await),
            Route::Jobs => Self::jobs(queue.as_ref(), &query).await,
            Route::Alive => Reply::empty(StatusCode::OK),
        }
    }

    async fn start(queue: &Q, body: Bytes) -> Reply {
        let submission = match serde_json::from_slice::<Submission>(&body) {
            Ok(submission) => submission,
            Err(e) => return e.into(),
        };
        if submission.config.request.target.trim().is_empty() {
            return Reply::bad_request("target must not be empty");
        }
        let metadata = submission.metadata.unwrap_or_default();
        let metadata = JobMetadata {
            request_id: metadata
                .request_id
                .or_else(|| Some(format!("req_{}", Utc::now().timestamp_millis()))),
            ..metadata
        };
        let id = queue.submit(submission.config, Some(metadata)).await;
        let mut response = ScanResponse::new(id, JobState::Queued);
        response.message = Some("Scan job has been queued successfully".to_owned());
        Reply::json(StatusCode::CREATED, &response)
    }

    async fn status(queue: &Q, id: &str) -> Reply {
        let job = match queue.status(id).await {
            Ok(job) => job,
            Err(_) => return ScanResponse::not_found(id),
        };
        let mut response = ScanResponse::new(job.id, job.state);
        response.progress = Some(job.progress.value());
        response.data = job.result;
        response.error = job.error.map(ErrorBody::Job);
        Reply::json(StatusCode::OK, &response)
    }

    async fn result(queue: &Q, id: &str) -> Reply {
        match queue.result(id).await {
            Ok(result) => {
                let mut response = ScanResponse::new(id, JobState::Terminated);
                response.progress = Some(100.0);
                response.data = Some(result);
                Reply::json(StatusCode::OK, &response)
            }
            Err(queue::Error::NotCompleted(_, state)) => {
                let mut response = ScanResponse::new(id, state);
                response.message = Some("Scan is not completed yet".to_owned());
                Reply::json(StatusCode::OK, &response)
            }
            Err(queue::Error::NotFound(_)) => ScanResponse::not_found(id),
        }
    }

    async fn cancel(queue: &Q, id: &str) -> Reply {
        match queue.cancel(id).await {
            Ok(state) => {
                let mut response = ScanResponse::new(id, state);
                response.message = match state {
                    JobState::Cancelled => Some("Scan job has been cancelled".to_owned()),
                    state if !state.is_terminal() => {
                        Some("Cancellation of the scan job has been requested".to_owned())
                    }
                    _ => None,
                };
                Reply::json(StatusCode::OK, &response)
            }
            Err(_) => ScanResponse::not_found(id),
        }
    }

    async fn jobs(queue: &Q, query: &HashMap<String, String>) -> Reply {
        let filter = match query.get("status").filter(|s| !s.is_empty()) {
            Some(status) => match status.parse::<StateFilter>() {
                Ok(filter) => Some(filter),
                Err(()) => return Reply::bad_request(format!("unknown status {status}")),
            },
            None => None,
        };
        let limit = match query.get("limit") {
            Some(limit) => match limit.parse::<usize>() {
                Ok(limit) => limit,
                Err(e) => return Reply::bad_request(format!("invalid limit {limit}: {e}")),
            },
            None => DEFAULT_LIMIT,
        };
        let jobs: Vec<JobSummary> = queue
            .list(filter, limit)
            .await
            .into_iter()
            .map(JobSummary::from)
            .collect();
        Reply::json(StatusCode::OK, &jobs)
    }
}

impl<Q, R> hyper::service::Service<hyper::Request<R>> for EntryPoint<Q>
where
    Q: JobQueue + 'static,
    R: hyper::body::Body + Send + 'static,
    <R as hyper::body::Body>::Error: std::error::Error,
    <R as hyper::body::Body>::Data: Send,
{
    type Response = hyper::Response<Full<Bytes>>;

    type Error = Infallible;

    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: hyper::Request<R>) -> Self::Future {
        let queue = self.queue.clone();
        Box::pin(async move {
            Ok(Self::handle(queue, req).await.into_response())
        })
    }
}

/// Accepts connections on `address` until an error occurs.
pub async fn serve<Q>(
    address: SocketAddr,
    queue: Arc<Q>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    Q: JobQueue + 'static,
{
    use hyper::server::conn::http1::Builder;

    let incoming = TcpListener::bind(&address).await?;
    tracing::info!("listening on http://{}", address);
    let entry_point = EntryPoint::new(queue);
    loop {
        let (tcp_stream, _remote_addr) = incoming.accept().await?;
        let service = entry_point.clone();
        tokio::spawn(async move {
            if let Err(err) = Builder::new()
                .serve_connection(TokioIo::new(tcp_stream), service)
                .await
            {
                tracing::debug!("failed to serve connection: {err:#}");
            }
        });
    }
}

#[cfg(test)]
mod tests;
