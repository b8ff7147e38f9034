//! Consumer contract for pushed monitoring snapshots.

use std::path::Path;

use crate::errorbuf::ErrorBufferSnapshot;
use crate::session::SessionStatisticsEntry;
use crate::stats::{ApplicationAdapterSnapshot, SessionAdapterSnapshot, SessionContainerSnapshot};

/// Sink for everything the agent observes during one poll invocation.
///
/// Every callback is synchronous and runs on the agent's invocation; a slow
/// implementation stalls the poll loop. Implementations receive snapshots by
/// reference only for the duration of the call and must copy anything they
/// keep.
pub trait MonitoringConsumer {
    fn application_adapter_statistics(&mut self, snapshot: &ApplicationAdapterSnapshot);

    fn session_adapter_statistics(&mut self, snapshots: &[SessionAdapterSnapshot]);

    fn session_container_statistics(&mut self, snapshots: &[SessionContainerSnapshot]);

    fn error_buffers(&mut self, buffers: &[ErrorBufferSnapshot]);

    /// One call per newly read entry, keyed by the statistics file it came
    /// from.
    fn session_statistics(&mut self, path: &Path, entry: &SessionStatisticsEntry);
}

/// Consumer that logs every push as a JSON line. Used by the bundled
/// monitoring binary.
#[derive(Debug, Default)]
pub struct LoggingConsumer;

impl MonitoringConsumer for LoggingConsumer {
    fn application_adapter_statistics(&mut self, snapshot: &ApplicationAdapterSnapshot) {
        log::info!(target: "monitoring", "application-adapter: {}", json(snapshot));
    }

    fn session_adapter_statistics(&mut self, snapshots: &[SessionAdapterSnapshot]) {
        log::info!(target: "monitoring", "session-adapters: {}", json(&snapshots));
    }

    fn session_container_statistics(&mut self, snapshots: &[SessionContainerSnapshot]) {
        log::info!(target: "monitoring", "session-containers: {}", json(&snapshots));
    }

    fn error_buffers(&mut self, buffers: &[ErrorBufferSnapshot]) {
        if buffers.iter().any(|buffer| !buffer.records.is_empty()) {
            log::warn!(target: "monitoring", "error-buffers: {}", json(&buffers));
        }
    }

    fn session_statistics(&mut self, path: &Path, entry: &SessionStatisticsEntry) {
        log::info!(
            target: "monitoring",
            "session `{}`: {}",
            path.display(),
            json(entry)
        );
    }
}

fn json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}
