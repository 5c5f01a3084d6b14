// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

#![doc = include_str!("README.md")]

mod config;

use std::sync::Arc;

use config::Config;
use sqlmaplib::{
    api,
    orchestrator::{Orchestrator, PollSettings},
    queue::{InMemoryQueue, QueueSettings},
    sqlmap::SqlmapClient,
    worker::WorkerPool,
};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();
    config.log.init();
    tracing::debug!("config:\n{config}");

    let client = SqlmapClient::new(&config.remote.address, config.remote.request_timeout)?;
    tracing::info!(remote = %config.remote.address, "using sqlmap REST API");
    let queue = Arc::new(InMemoryQueue::new(QueueSettings::from(&config.queue)));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(client),
        PollSettings::from(&config.scheduling),
    ));
    let pool = WorkerPool::spawn(queue.clone(), orchestrator, config.scheduling.workers);
    tracing::info!(workers = config.scheduling.workers, "workers started");

    let result = tokio::select! {
        result = api::serve(config.listener.address, queue) => result,
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down, waiting for running jobs");
            signal.map_err(Into::into)
        }
    };
    pool.shutdown().await;
    result
}
