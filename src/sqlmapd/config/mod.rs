// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

mod duration;
mod logging;

use std::{
    fmt::{self, Display, Formatter},
    net::SocketAddr,
    time::Duration,
};

use clap::ArgAction;
use serde::{Deserialize, Serialize};

use logging::Logging;
use sqlmaplib::{orchestrator::PollSettings, queue::QueueSettings};

/// The sqlmap REST API jobs are executed on.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Remote {
    pub address: String,
    #[serde(with = "duration")]
    pub request_timeout: Duration,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            address: "http://localhost:8775".to_owned(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Scheduling {
    #[serde(with = "duration")]
    pub poll_interval: Duration,
    pub max_ticks: u32,
    pub workers: usize,
}

impl Default for Scheduling {
    fn default() -> Self {
        let poll = PollSettings::default();
        Self {
            poll_interval: poll.interval,
            max_ticks: poll.max_ticks,
            workers: 2,
        }
    }
}

impl From<&Scheduling> for PollSettings {
    fn from(value: &Scheduling) -> Self {
        Self {
            interval: value.poll_interval,
            max_ticks: value.max_ticks,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Queue {
    pub max_attempts: u32,
    #[serde(with = "duration")]
    pub backoff: Duration,
    pub retain_completed: usize,
    pub retain_failed: usize,
}

impl Default for Queue {
    fn default() -> Self {
        let queue = QueueSettings::default();
        Self {
            max_attempts: queue.max_attempts,
            backoff: queue.backoff,
            retain_completed: queue.retain_completed,
            retain_failed: queue.retain_failed,
        }
    }
}

impl From<&Queue> for QueueSettings {
    fn from(value: &Queue) -> Self {
        Self {
            max_attempts: value.max_attempts.max(1),
            backoff: value.backoff,
            retain_completed: value.retain_completed,
            retain_failed: value.retain_failed,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Listener {
    pub address: SocketAddr,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8776).into(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub scheduling: Scheduling,
    #[serde(default)]
    pub queue: Queue,
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub log: Logging,
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", toml::to_string_pretty(self).unwrap_or_default())
    }
}

impl Config {
    fn load_etc() -> Option<Self> {
        let config = std::fs::read_to_string("/etc/sqlmapd/sqlmapd.toml").ok()?;
        toml::from_str(&config).ok()
    }

    fn load_user() -> Option<Self> {
        let home = std::env::var("HOME").ok()?;
        let path = format!("{home}/.config/sqlmapd/sqlmapd.toml");
        let config = std::fs::read_to_string(path).ok()?;
        toml::from_str(&config).ok()
    }

    fn from_file<P>(path: P) -> Self
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        tracing::debug!("loading config from {}", path);
        let config = std::fs::read_to_string(path).unwrap_or_default();
        toml::from_str(&config).unwrap_or_default()
    }

    pub fn load() -> Self {
        let cmds = clap::Command::new("sqlmapd")
            .about("runs sqlmap scan jobs against a sqlmap REST API")
            .arg(
                clap::Arg::new("config")
                    .short('c')
                    .env("SQLMAPD_CONFIG")
                    .long("config")
                    .action(ArgAction::Set)
                    .help("path to toml config file"),
            )
            .arg(
                clap::Arg::new("sqlmap-api-url")
                    .env("SQLMAP_API_URL")
                    .long("sqlmap-api-url")
                    .value_name("URL")
                    .action(ArgAction::Set)
                    .help("base url of the sqlmap REST API (e.g. http://localhost:8775)"),
            )
            .arg(
                clap::Arg::new("listening")
                    .env("LISTENING")
                    .long("listening")
                    .short('l')
                    .value_name("IP:PORT")
                    .value_parser(clap::value_parser!(SocketAddr))
                    .help("the address to listen to (e.g. 127.0.0.1:8776 or 0.0.0.0:8776)."),
            )
            .arg(
                clap::Arg::new("workers")
                    .env("WORKERS")
                    .long("workers")
                    .value_parser(clap::value_parser!(usize))
                    .help("number of jobs executed concurrently"),
            )
            .arg(
                clap::Arg::new("poll-interval")
                    .env("POLL_INTERVAL")
                    .long("poll-interval")
                    .value_name("DURATION")
                    .value_parser(duration::parse)
                    .help("interval between status checks of a running scan (e.g. 5s)"),
            )
            .arg(
                clap::Arg::new("max-ticks")
                    .env("MAX_TICKS")
                    .long("max-ticks")
                    .value_parser(clap::value_parser!(u32))
                    .help("status checks before a running scan times out"),
            )
            .arg(
                clap::Arg::new("log-level")
                    .env("LOG_LEVEL")
                    .long("log-level")
                    .short('L')
                    .value_parser(clap::value_parser!(logging::SerLevel))
                    .help("level of log messages to be shown (trace, debug, info, warn, error)"),
            )
            .get_matches();
        let mut config = match cmds.get_one::<String>("config") {
            Some(path) => Self::from_file(path),
            None => Self::load_user()
                .or_else(Self::load_etc)
                .unwrap_or_default(),
        };
        if let Some(url) = cmds.get_one::<String>("sqlmap-api-url") {
            config.remote.address = url.clone();
        }
        if let Some(ip) = cmds.get_one::<SocketAddr>("listening") {
            config.listener.address = *ip;
        }
        if let Some(workers) = cmds.get_one::<usize>("workers") {
            config.scheduling.workers = *workers;
        }
        if let Some(interval) = cmds.get_one::<Duration>("poll-interval") {
            config.scheduling.poll_interval = *interval;
        }
        if let Some(ticks) = cmds.get_one::<u32>("max-ticks") {
            config.scheduling.max_ticks = *ticks;
        }
        if let Some(level) = cmds.get_one::<logging::SerLevel>("log-level") {
            config.log.level = *level;
        }
        config
    }
}
