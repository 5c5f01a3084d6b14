// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use std::{sync::Arc, time::Duration};

use chrono::{TimeZone, Utc};
use tokio::time::{self, Instant};

use super::{Error, InMemoryQueue, JobQueue, QueueSettings, StateFilter};
use crate::{
    models::{
        JobEvent, JobState, Progress, ScanConfiguration, ScanJob, ScanOutcome, ScanResult,
        TerminalStatus, scanner,
    },
    orchestrator::{JobRecord, RunError},
};

fn config() -> ScanConfiguration {
    ScanConfiguration::new("http://localhost/?id=1")
}

fn transport_error() -> Result<ScanOutcome, RunError> {
    Err(RunError::Remote(scanner::Error::Transport(
        "connection refused".to_owned(),
    )))
}

fn terminated(mut job: ScanJob, finished_second: u32) -> (ScanJob, Result<ScanOutcome, RunError>) {
    let result = ScanResult {
        data: serde_json::json!({"data": []}),
        log: vec!["done".to_owned()],
    };
    job.state = JobState::Terminated;
    job.progress = Progress::DONE;
    job.result = Some(result.clone());
    job.finished_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, finished_second).unwrap());
    let outcome = ScanOutcome {
        job_id: job.id.clone(),
        task_id: None,
        status: TerminalStatus::Terminated,
        progress: Progress::DONE,
        result: Some(result),
    };
    (job, Ok(outcome))
}

#[tokio::test]
async fn hands_out_in_submission_order() {
    let queue = InMemoryQueue::default();
    let first = queue.submit(config(), None).await;
    let second = queue.submit(config(), None).await;
    assert_eq!(queue.next().await.id, first);
    assert_eq!(queue.next().await.id, second);
    let stats = queue.stats().await;
    assert_eq!(stats.waiting, 2);
    assert_eq!(stats.total, 2);
}

#[tokio::test(start_paused = true)]
async fn idle_next_waits_for_submission() {
    let queue = Arc::new(InMemoryQueue::default());
    let waiting = tokio::spawn({
        let queue = queue.clone();
        async move { queue.next().await }
    });
    time::sleep(Duration::from_secs(10)).await;
    assert!(!waiting.is_finished());
    let id = queue.submit(config(), None).await;
    assert_eq!(waiting.await.unwrap().id, id);
}

#[tokio::test(start_paused = true)]
async fn retries_with_exponential_backoff() {
    let queue = InMemoryQueue::default();
    let id = queue.submit(config(), None).await;

    let job = queue.next().await;
    queue.record(&id, &JobEvent::TaskAssigned("task-1".to_owned())).await;
    queue.finish(job, &transport_error()).await;
    let status = queue.status(&id).await.unwrap();
    assert_eq!(status.state, JobState::Queued);
    assert_eq!(status.attempt, 2);
    assert_eq!(status.task_id, None);

    let started = Instant::now();
    let job = queue.next().await;
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(job.attempt, 2);
    queue.finish(job, &transport_error()).await;

    let started = Instant::now();
    let job = queue.next().await;
    assert_eq!(started.elapsed(), Duration::from_secs(4));
    let mut job = job;
    job.transition(JobState::Failed);
    queue.finish(job, &transport_error()).await;

    let status = queue.status(&id).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.attempt, 3);
}

#[tokio::test(start_paused = true)]
async fn huge_backoff_postpones_retry() {
    let queue = InMemoryQueue::new(QueueSettings {
        backoff: Duration::MAX,
        ..Default::default()
    });
    let id = queue.submit(config(), None).await;
    let job = queue.next().await;
    queue.finish(job, &transport_error()).await;

    let status = queue.status(&id).await.unwrap();
    assert_eq!(status.state, JobState::Queued);
    assert_eq!(status.attempt, 2);
    assert!(
        time::timeout(Duration::from_secs(3600), queue.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn non_retryable_failure_is_final() {
    let queue = InMemoryQueue::default();
    let id = queue.submit(config(), None).await;
    let mut job = queue.next().await;
    job.transition(JobState::Failed);
    let error = RunError::Timeout {
        task_id: "task-1".to_owned(),
        ticks: 1000,
    };
    job.error = Some((&error).into());
    queue.finish(job, &Err(error)).await;

    let status = queue.status(&id).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.attempt, 1);
    assert!(!status.error.unwrap().retryable);
    assert_eq!(queue.stats().await.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_queued_job() {
    let queue = InMemoryQueue::default();
    let id = queue.submit(config(), None).await;
    assert_eq!(queue.cancel(&id).await, Ok(JobState::Cancelled));
    assert_eq!(queue.status(&id).await.unwrap().state, JobState::Cancelled);
    assert!(
        time::timeout(Duration::from_secs(1), queue.next())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn cancel_active_job_raises_signal() {
    let queue = InMemoryQueue::default();
    let id = queue.submit(config(), None).await;
    let job = queue.next().await;
    queue
        .record(&job.id, &JobEvent::State(JobState::Configuring))
        .await;
    assert!(!queue.is_cancelled(&id).await);
    // the attempt may still fail before it observes the cancellation
    assert_eq!(queue.cancel(&id).await, Ok(JobState::Configuring));
    assert!(queue.is_cancelled(&id).await);
    assert_eq!(queue.status(&id).await.unwrap().state, JobState::Configuring);

    // a cancelled job is not retried
    queue.finish(job, &transport_error()).await;
    assert_eq!(queue.status(&id).await.unwrap().attempt, 1);
}

#[tokio::test]
async fn cancel_terminal_job_keeps_state() {
    let queue = InMemoryQueue::default();
    let id = queue.submit(config(), None).await;
    let (job, outcome) = terminated(queue.next().await, 0);
    queue.finish(job, &outcome).await;
    assert_eq!(queue.cancel(&id).await, Ok(JobState::Terminated));
}

#[tokio::test]
async fn queries() {
    let queue = InMemoryQueue::default();
    assert_eq!(
        queue.status("unknown").await,
        Err(Error::NotFound("unknown".to_owned()))
    );
    assert_eq!(
        queue.cancel("unknown").await,
        Err(Error::NotFound("unknown".to_owned()))
    );
    let id = queue.submit(config(), None).await;
    assert_eq!(
        queue.result(&id).await,
        Err(Error::NotCompleted(id.clone(), JobState::Queued))
    );
    let (job, outcome) = terminated(queue.next().await, 0);
    queue.finish(job, &outcome).await;
    let result = queue.result(&id).await.unwrap();
    assert_eq!(result.log, vec!["done"]);
}

#[tokio::test]
async fn keeps_only_recent_finished_jobs() {
    let queue = InMemoryQueue::new(QueueSettings {
        retain_completed: 2,
        ..Default::default()
    });
    let mut ids = vec![];
    for second in 0..3 {
        ids.push(queue.submit(config(), None).await);
        let (job, outcome) = terminated(queue.next().await, second);
        queue.finish(job, &outcome).await;
    }
    assert!(queue.status(&ids[0]).await.is_err());
    assert!(queue.status(&ids[1]).await.is_ok());
    assert!(queue.status(&ids[2]).await.is_ok());
    assert_eq!(queue.stats().await.completed, 2);
}

#[tokio::test]
async fn list_filters_and_limits() {
    let queue = InMemoryQueue::default();
    for _ in 0..4 {
        queue.submit(config(), None).await;
    }
    let (job, outcome) = terminated(queue.next().await, 0);
    queue.finish(job, &outcome).await;

    assert_eq!(queue.list(None, 10).await.len(), 4);
    assert_eq!(queue.list(None, 2).await.len(), 2);
    assert_eq!(queue.list(Some(StateFilter::Waiting), 10).await.len(), 3);
    let completed = queue.list(Some(StateFilter::Completed), 10).await;
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].state, JobState::Terminated);
    assert!(queue.list(Some(StateFilter::Active), 10).await.is_empty());
}

#[test]
fn backoff_doubles() {
    let settings = QueueSettings::default();
    assert_eq!(settings.backoff_for(1), Duration::from_secs(2));
    assert_eq!(settings.backoff_for(2), Duration::from_secs(4));
    assert_eq!(settings.backoff_for(3), Duration::from_secs(8));
}

#[test]
fn parse_filter() {
    assert_eq!("active".parse(), Ok(StateFilter::Active));
    assert_eq!("running".parse::<StateFilter>(), Err(()));
}
