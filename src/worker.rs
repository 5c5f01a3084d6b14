// SPDX-FileCopyrightText: 2024 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Workers taking jobs from a [JobQueue] and running them with an [Orchestrator].

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    models::scanner::RemoteScanner,
    orchestrator::Orchestrator,
    queue::JobQueue,
};

/// A fixed number of workers, each owning at most one job at a time.
pub struct WorkerPool {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` tasks, at least one.
    pub fn spawn<Q, S>(queue: Arc<Q>, orchestrator: Arc<Orchestrator<S>>, workers: usize) -> Self
    where
        Q: JobQueue + 'static,
        S: RemoteScanner + 'static,
    {
        let (stop, receiver) = watch::channel(false);
        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(work(
                    worker,
                    queue.clone(),
                    orchestrator.clone(),
                    receiver.clone(),
                ))
            })
            .collect();
        Self { stop, handles }
    }

    /// Stops taking new jobs and waits until the running ones are finished.
    pub async fn shutdown(self) {
        if self.stop.send(true).is_err() {
            debug!("all workers already stopped");
        }
        for result in futures::future::join_all(self.handles).await {
            if let Err(error) = result {
                warn!(%error, "worker stopped unexpectedly");
            }
        }
    }
}

async fn work<Q, S>(
    worker: usize,
    queue: Arc<Q>,
    orchestrator: Arc<Orchestrator<S>>,
    mut stop: watch::Receiver<bool>,
) where
    Q: JobQueue + 'static,
    S: RemoteScanner + 'static,
{
    debug!(worker, "worker started");
    loop {
        if *stop.borrow() {
            break;
        }
        let mut job = tokio::select! {
            job = queue.next() => job,
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };
        let result = orchestrator.run(&mut job, queue.as_ref()).await;
        match &result {
            Ok(outcome) => info!(
                worker,
                job_id = %job.id,
                status = ?outcome.status,
                "job finished"
            ),
            Err(error) => warn!(
                worker,
                job_id = %job.id,
                attempt = job.attempt,
                retryable = error.is_retryable(),
                %error,
                "job attempt failed"
            ),
        }
        queue.finish(job, &result).await;
    }
    debug!(worker, "worker stopped");
}
