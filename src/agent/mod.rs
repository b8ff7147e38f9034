//! The statistics monitoring agent: a single unit of work driven by an
//! external host scheduler.
//!
//! Each invocation runs discovery at a bounded cadence, snapshots every
//! mapped region, reads newly appended session statistics entries, and pushes
//! all of it to the [`MonitoringConsumer`]. The agent owns no thread and no
//! timer; sequencing and idle backoff belong to the host. Only one invocation
//! is ever in flight, so the agent's own state needs no synchronization.

mod error;

pub use error::{CloseError, Error, Result};

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::{DeploymentMode, MonitorConfig};
use crate::consumer::MonitoringConsumer;
use crate::errorbuf::ErrorBufferSnapshot;
use crate::markfile::MarkFile;
use crate::session;
use crate::stats::{MappedApplicationAdapterStats, MappedSessionAdapterStats};

/// Wall-clock floor between two directory scans, regardless of how often the
/// host invokes the agent.
pub const SESSION_FILE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// The agent is a pure poller and never claims work, so the host scheduler
/// is free to apply idle backoff.
const FORCE_IDLE: usize = 0;

pub struct MonitoringAgent<C> {
    config: MonitorConfig,
    consumer: C,
    application_adapter_statistics: Option<MappedApplicationAdapterStats>,
    session_adapter_statistics: Vec<MappedSessionAdapterStats>,
    mark_files: Vec<MarkFile>,
    /// Monotonic registry of tracked session statistics files and the byte
    /// offset up to which each has been delivered. Paths are never retired,
    /// even when the backing file disappears, so the registry grows without
    /// bound over the agent's lifetime.
    session_statistics_files: HashMap<PathBuf, u64>,
    last_session_file_check: Option<Instant>,
    closed: bool,
}

impl<C: MonitoringConsumer> MonitoringAgent<C> {
    /// Attaches to every statistics region of every configured instance.
    ///
    /// In separated mode the shared application-adapter file and one
    /// session-adapter region per instance are mapped from the primary
    /// instance directory; in embedded mode neither exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceUnavailable`] if any required file is missing
    /// or mis-sized. Construction is atomic: regions mapped before the
    /// failure are released before the error propagates.
    pub fn new(config: MonitorConfig, consumer: C) -> Result<Self> {
        let instance_count = config.instance_count();
        let (application_adapter_statistics, session_adapter_statistics) =
            match config.deployment_mode() {
                DeploymentMode::Separated => {
                    let primary = config.primary_directory();
                    let application = MappedApplicationAdapterStats::attach(primary)?;
                    let mut adapters = Vec::with_capacity(instance_count);
                    for instance in 0..instance_count {
                        adapters.push(MappedSessionAdapterStats::attach(
                            primary,
                            instance,
                            instance_count,
                        )?);
                    }
                    (Some(application), adapters)
                }
                DeploymentMode::Embedded => (None, Vec::new()),
            };

        let mut mark_files = Vec::with_capacity(instance_count);
        for instance in 0..instance_count {
            mark_files.push(MarkFile::attach(config.instance_directory(instance))?);
        }

        log::debug!(
            target: "monitoring-agent",
            "attached {instance_count} instance(s) in {:?} mode",
            config.deployment_mode()
        );
        Ok(Self {
            config,
            consumer,
            application_adapter_statistics,
            session_adapter_statistics,
            mark_files,
            session_statistics_files: HashMap::new(),
            last_session_file_check: None,
            closed: false,
        })
    }

    pub fn role_name(&self) -> &'static str {
        "statistics-monitoring-agent"
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// One unit of work at the current wall-clock time.
    pub fn do_work(&mut self) -> Result<usize> {
        self.poll_at(Instant::now())
    }

    /// One unit of work as of `now`; split out so hosts and tests control
    /// time.
    ///
    /// # Errors
    ///
    /// Discovery and session-file read failures abort the invocation
    /// (fail-fast, no per-instance isolation); mapped-region reads cannot
    /// fail.
    pub fn poll_at(&mut self, now: Instant) -> Result<usize> {
        if self.closed {
            // the host kept scheduling past shutdown; nothing left to read
            return Ok(FORCE_IDLE);
        }
        if self
            .last_session_file_check
            .is_none_or(|last| now.duration_since(last) >= SESSION_FILE_CHECK_INTERVAL)
        {
            self.check_for_new_session_files()?;
            self.last_session_file_check = Some(now);
        }

        if let Some(statistics) = &self.application_adapter_statistics {
            self.consumer
                .application_adapter_statistics(&statistics.snapshot());
        }
        if !self.session_adapter_statistics.is_empty() {
            let snapshots: Vec<_> = self
                .session_adapter_statistics
                .iter()
                .map(|statistics| statistics.snapshot())
                .collect();
            self.consumer.session_adapter_statistics(&snapshots);
        }

        let container_snapshots: Vec<_> = self
            .mark_files
            .iter()
            .map(|mark_file| mark_file.container_statistics().snapshot())
            .collect();
        self.consumer
            .session_container_statistics(&container_snapshots);

        let error_snapshots: Vec<_> = self
            .mark_files
            .iter()
            .map(|mark_file| ErrorBufferSnapshot {
                records: mark_file.error_buffer().read(),
            })
            .collect();
        self.consumer.error_buffers(&error_snapshots);

        let consumer = &mut self.consumer;
        for (path, offset) in &mut self.session_statistics_files {
            match session::read_entries(path, *offset, |entry| {
                consumer.session_statistics(path, entry);
            }) {
                Ok(next_offset) => *offset = next_offset,
                Err(session::Error::Open { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    // tracked forever; a vanished file only goes quiet
                    log::warn!(
                        target: "monitoring-agent",
                        "tracked session statistics file `{}` is gone",
                        path.display()
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(FORCE_IDLE)
    }

    fn check_for_new_session_files(&mut self) -> Result<()> {
        for instance in 0..self.config.instance_count() {
            let directory = self.config.instance_directory(instance);
            let entries = std::fs::read_dir(directory).map_err(|source| Error::Discovery {
                path: directory.to_path_buf(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| Error::Discovery {
                    path: directory.to_path_buf(),
                    source,
                })?;
                let path = entry.path();
                if session::is_session_statistics_file(&path)
                    && !self.session_statistics_files.contains_key(&path)
                {
                    log::debug!(
                        target: "monitoring-agent",
                        "tracking session statistics file `{}`",
                        path.display()
                    );
                    self.session_statistics_files.insert(path, 0);
                }
            }
        }
        Ok(())
    }

    /// Releases every mapped region and error-buffer resource.
    ///
    /// Best-effort aggregate: a failure to release one resource does not
    /// prevent attempting the rest. Idempotent: a second call returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns a single [`CloseError`] carrying every individual failure.
    pub fn close(&mut self) -> std::result::Result<(), CloseError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut resources: Vec<&mut dyn crate::mapping::Closeable> = Vec::new();
        if let Some(statistics) = &mut self.application_adapter_statistics {
            resources.push(statistics);
        }
        for statistics in &mut self.session_adapter_statistics {
            resources.push(statistics);
        }
        for mark_file in &mut self.mark_files {
            resources.extend(mark_file.closeables());
        }
        let failures = crate::mapping::close_all(resources);

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CloseError { failures })
        }
    }
}
