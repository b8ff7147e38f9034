//! Monitoring subsystem for a multi-process session server.
//!
//! Session-container processes expose operational counters through fixed-
//! layout memory-mapped files, written lock-free with ordered stores. This
//! library attaches to those regions from a separate monitoring process,
//! polls them on a host-driven cadence, discovers dynamically created
//! per-session statistics files, and pushes snapshots to a pluggable
//! [`consumer::MonitoringConsumer`].

pub mod agent;
pub mod config;
pub mod consumer;
pub mod errorbuf;
pub mod mapping;
pub mod markfile;
pub mod session;
pub mod stats;

use std::path::PathBuf;
use std::time::Duration;

use agent::MonitoringAgent;
use config::{DeploymentMode, MonitorConfig};
use consumer::LoggingConsumer;

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Runs the bundled monitoring tool: attaches to the instances named by
/// `MONITOR_INSTANCE_DIRS` (comma-separated directories) and logs every
/// snapshot as JSON until the process is stopped.
///
/// `MONITOR_DEPLOYMENT_MODE` selects `separated` or `embedded` (default),
/// `MONITOR_POLL_INTERVAL_MS` the poll cadence.
///
/// # Errors
///
/// Returns an error if the environment is incomplete, a required statistics
/// file is missing or mis-sized, or a poll invocation fails.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let instance_directories: Vec<PathBuf> = std::env::var("MONITOR_INSTANCE_DIRS")?
        .split(',')
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect();
    let deployment_mode: DeploymentMode = std::env::var("MONITOR_DEPLOYMENT_MODE")
        .unwrap_or_else(|_| "embedded".to_owned())
        .parse()?;
    let poll_interval = std::env::var("MONITOR_POLL_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

    let config = MonitorConfig::new(instance_directories, deployment_mode)?;
    let mut agent = MonitoringAgent::new(config, LoggingConsumer)?;
    log::info!("{} started, polling every {poll_interval}ms", agent.role_name());

    loop {
        agent.do_work()?;
        std::thread::sleep(Duration::from_millis(poll_interval));
    }
}
