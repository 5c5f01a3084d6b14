// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode, body::Bytes, service::Service};
use serde_json::{Value, json};

use super::EntryPoint;
use crate::{
    models::{JobEvent, JobState, Progress, ScanOutcome, ScanResult, TerminalStatus},
    orchestrator::JobRecord,
    queue::{InMemoryQueue, JobQueue},
};

struct Client {
    queue: Arc<InMemoryQueue>,
    entry: EntryPoint<InMemoryQueue>,
}

impl Client {
    fn new() -> Self {
        let queue = Arc::new(InMemoryQueue::default());
        Self {
            entry: EntryPoint::new(queue.clone()),
            queue,
        }
    }

    async fn send(&self, method: Method, uri: &str, body: &str) -> (StatusCode, Option<Value>) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from(body.to_owned())))
            .unwrap();
        let resp = self.entry.call(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        if bytes.is_empty() {
            (status, None)
        } else {
            (status, Some(serde_json::from_slice(&bytes).unwrap()))
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, Option<Value>) {
        self.send(Method::GET, uri, "").await
    }

    async fn submit(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/scan/start",
                r#"{"target": "http://localhost/?id=1", "tor": true}"#,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body.unwrap()["taskId"].as_str().unwrap().to_owned()
    }
}

#[tokio::test]
async fn start_queues_job() {
    let client = Client::new();
    let (status, body) = client
        .send(
            Method::POST,
            "/scan/start",
            r#"{"target": "http://localhost/?id=1", "delay": 1.5, "metadata": {"userId": "u1"}}"#,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let body = body.unwrap();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["message"], "Scan job has been queued successfully");

    let id = body["taskId"].as_str().unwrap();
    let job = client.queue.status(id).await.unwrap();
    assert_eq!(job.config.request.target, "http://localhost/?id=1");
    let metadata = job.metadata.unwrap();
    assert_eq!(metadata.user_id.as_deref(), Some("u1"));
    assert!(metadata.request_id.unwrap().starts_with("req_"));
}

#[tokio::test]
async fn start_rejects_invalid_submissions() {
    let client = Client::new();
    let (status, body) = client.send(Method::POST, "/scan/start", "{").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = body.unwrap();
    assert_eq!(body["line"], 1);
    assert!(body["column"].is_number());

    let (status, _) = client
        .send(Method::POST, "/scan/start", r#"{"method": "POST"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = client
        .send(Method::POST, "/scan/start", r#"{"target": "  "}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["message"], "target must not be empty");
    assert_eq!(client.queue.stats().await.total, 0);
}

#[tokio::test]
async fn status_of_jobs() {
    let client = Client::new();
    let (status, body) = client.get("/scan/status/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = body.unwrap();
    assert_eq!(body["status"], "not_found");
    assert_eq!(body["error"], "Job not found");

    let id = client.submit().await;
    client
        .queue
        .record(&id, &JobEvent::State(JobState::Configuring))
        .await;
    client
        .queue
        .record(&id, &JobEvent::Progress(Progress::new(20.0)))
        .await;
    let (status, body) = client.get(&format!("/scan/status/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["taskId"], id.as_str());
    assert_eq!(body["status"], "configuring");
    assert_eq!(body["progress"], 20.0);
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn result_of_jobs() {
    let client = Client::new();
    let id = client.submit().await;
    let (status, body) = client.get(&format!("/scan/result/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["message"], "Scan is not completed yet");

    let mut job = client.queue.next().await;
    let result = ScanResult {
        data: json!({"data": [{"type": 1}]}),
        log: vec!["starting".to_owned()],
    };
    job.transition(JobState::Configuring);
    job.transition(JobState::Starting);
    job.transition(JobState::Running);
    job.transition(JobState::Terminated);
    job.progress = Progress::DONE;
    job.result = Some(result.clone());
    let outcome = ScanOutcome {
        job_id: id.clone(),
        task_id: None,
        status: TerminalStatus::Terminated,
        progress: Progress::DONE,
        result: Some(result),
    };
    client.queue.finish(job, &Ok(outcome)).await;

    let (status, body) = client.get(&format!("/scan/result/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.unwrap(),
        json!({
            "taskId": id,
            "status": "terminated",
            "progress": 100.0,
            "data": {"data": {"data": [{"type": 1}]}, "log": ["starting"]},
        })
    );

    let (status, _) = client.get("/scan/result/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_jobs() {
    let client = Client::new();
    let id = client.submit().await;
    let (status, body) = client
        .send(Method::POST, &format!("/scan/cancel/{id}"), "")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "cancelled");
    assert_eq!(
        client.queue.status(&id).await.unwrap().state,
        JobState::Cancelled
    );

    let (status, _) = client.send(Method::POST, "/scan/cancel/unknown", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_running_job_is_only_requested() {
    let client = Client::new();
    let id = client.submit().await;
    let job = client.queue.next().await;
    client
        .queue
        .record(&job.id, &JobEvent::State(JobState::Configuring))
        .await;

    let (status, body) = client
        .send(Method::POST, &format!("/scan/cancel/{id}"), "")
        .await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "configuring");
    assert_eq!(
        body["message"],
        "Cancellation of the scan job has been requested"
    );
    assert!(client.queue.is_cancelled(&id).await);
}

#[tokio::test]
async fn queue_queries() {
    let client = Client::new();
    for _ in 0..3 {
        client.submit().await;
    }
    let (status, body) = client.get("/scan/queue/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.unwrap(),
        json!({"waiting": 3, "active": 0, "completed": 0, "failed": 0, "cancelled": 0, "total": 3})
    );

    let (status, body) = client.get("/scan/queue/jobs?status=waiting&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body.unwrap();
    let jobs = jobs.as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["state"], "queued");
    assert_eq!(jobs[0]["attempt"], 1);

    let (_, body) = client.get("/scan/queue/jobs").await;
    assert_eq!(body.unwrap().as_array().unwrap().len(), 3);
    let (_, body) = client.get("/scan/queue/jobs?status=completed").await;
    assert!(body.unwrap().as_array().unwrap().is_empty());

    let (status, _) = client.get("/scan/queue/jobs?status=running").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = client.get("/scan/queue/jobs?limit=many").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn routing() {
    let client = Client::new();
    assert_eq!(client.get("/health/alive").await, (StatusCode::OK, None));
    assert_eq!(
        client.send(Method::HEAD, "/scan/queue/stats", "").await,
        (StatusCode::OK, None)
    );
    assert_eq!(
        client.get("/scan/start").await,
        (StatusCode::METHOD_NOT_ALLOWED, None)
    );
    assert_eq!(
        client.send(Method::DELETE, "/scan/status/1", "").await,
        (StatusCode::METHOD_NOT_ALLOWED, None)
    );
    assert_eq!(client.get("/scans").await, (StatusCode::NOT_FOUND, None));
    assert_eq!(
        client.get("/scan/status").await,
        (StatusCode::NOT_FOUND, None)
    );
}

#[test]
fn decodes_query_parameters() {
    let query = super::query_parameters(Some("status=waiting&limit=5&name=a%20b+c&flag"));
    assert_eq!(query["status"], "waiting");
    assert_eq!(query["limit"], "5");
    assert_eq!(query["name"], "a b c");
    assert_eq!(query["flag"], "");
    assert!(super::query_parameters(None).is_empty());
}
