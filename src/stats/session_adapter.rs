//! Session-adapter statistics.
//!
//! All instances share one file in the primary instance directory; instance
//! `i` owns the 24-byte region at byte offset `i * LENGTH`.

use std::path::Path;

use crate::mapping::{self, MappedRegion};

use super::buffer::StatsBuffer;

pub const FILE_NAME: &str = "session-adapter-stats.data";

const POLL_LIMIT_REACHED_OFFSET: usize = 0;
const BACK_PRESSURE_COUNT_OFFSET: usize = POLL_LIMIT_REACHED_OFFSET + 8;
const HEARTBEAT_OFFSET: usize = BACK_PRESSURE_COUNT_OFFSET + 8;

/// Length of one per-instance region, not of the shared file.
pub const LENGTH: usize = HEARTBEAT_OFFSET + 8;

#[derive(Debug)]
pub struct SessionAdapterStats<B> {
    buffer: B,
    offset: usize,
    poll_limit_reached_count: u64,
    back_pressure_count: u64,
}

pub type MappedSessionAdapterStats = SessionAdapterStats<MappedRegion>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionAdapterSnapshot {
    pub poll_limit_reached_count: u64,
    pub back_pressure_count: u64,
    pub heartbeat_ms: u64,
}

impl<B: StatsBuffer> SessionAdapterStats<B> {
    pub fn new(buffer: B, offset: usize) -> Self {
        Self {
            buffer,
            offset,
            poll_limit_reached_count: 0,
            back_pressure_count: 0,
        }
    }

    pub fn adapter_poll_limit_reached(&mut self) {
        self.poll_limit_reached_count += 1;
        self.buffer.put_u64_ordered(
            self.offset + POLL_LIMIT_REACHED_OFFSET,
            self.poll_limit_reached_count,
        );
    }

    pub fn back_pressure(&mut self) {
        self.back_pressure_count += 1;
        self.buffer.put_u64_ordered(
            self.offset + BACK_PRESSURE_COUNT_OFFSET,
            self.back_pressure_count,
        );
    }

    pub fn heartbeat(&self, time_ms: u64) {
        self.buffer
            .put_u64_ordered(self.offset + HEARTBEAT_OFFSET, time_ms);
    }

    /// Zeroes the monotonic counters; the heartbeat is untouched.
    pub fn reset(&mut self) {
        self.poll_limit_reached_count = 0;
        self.back_pressure_count = 0;
        self.buffer
            .put_u64_ordered(self.offset + POLL_LIMIT_REACHED_OFFSET, 0);
        self.buffer
            .put_u64_ordered(self.offset + BACK_PRESSURE_COUNT_OFFSET, 0);
    }

    pub fn poll_limit_reached_count(&self) -> u64 {
        self.buffer
            .get_u64_volatile(self.offset + POLL_LIMIT_REACHED_OFFSET)
    }

    pub fn back_pressure_count(&self) -> u64 {
        self.buffer
            .get_u64_volatile(self.offset + BACK_PRESSURE_COUNT_OFFSET)
    }

    pub fn snapshot(&self) -> SessionAdapterSnapshot {
        SessionAdapterSnapshot {
            poll_limit_reached_count: self.poll_limit_reached_count(),
            back_pressure_count: self.back_pressure_count(),
            heartbeat_ms: self.buffer.get_u64_volatile(self.offset + HEARTBEAT_OFFSET),
        }
    }
}

impl MappedSessionAdapterStats {
    /// Attaches to instance `instance`'s region of the shared adapter file in
    /// `directory`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or its length is not exactly
    /// `instance_count` regions.
    pub fn attach(
        directory: &Path,
        instance: usize,
        instance_count: usize,
    ) -> mapping::Result<Self> {
        let path = directory.join(FILE_NAME);
        let expected = (instance_count * LENGTH) as u64;
        let metadata = std::fs::metadata(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                mapping::Error::Missing { path: path.clone() }
            } else {
                mapping::Error::Open {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        if metadata.len() != expected {
            return Err(mapping::Error::SizeMismatch {
                path,
                expected,
                actual: metadata.len(),
            });
        }
        let region = MappedRegion::attach_at(&path, instance * LENGTH, LENGTH)?;
        Ok(Self::new(region, 0))
    }

    pub fn close(&mut self) -> mapping::Result<()> {
        self.buffer.close()
    }
}

impl mapping::Closeable for MappedSessionAdapterStats {
    fn close(&mut self) -> mapping::Result<()> {
        self.buffer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::HeapBuffer;

    #[test]
    fn test_reset_keeps_heartbeat() {
        let mut stats = SessionAdapterStats::new(HeapBuffer::new(LENGTH), 0);
        stats.adapter_poll_limit_reached();
        stats.back_pressure();
        stats.heartbeat(777);
        stats.reset();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.poll_limit_reached_count, 0);
        assert_eq!(snapshot.back_pressure_count, 0);
        assert_eq!(snapshot.heartbeat_ms, 777);
    }

    #[test]
    fn test_instances_do_not_alias_within_shared_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join(FILE_NAME), vec![0u8; LENGTH * 2])
            .expect("failed to create file");
        let mut first = MappedSessionAdapterStats::attach(dir.path(), 0, 2).expect("attach failed");
        let second = MappedSessionAdapterStats::attach(dir.path(), 1, 2).expect("attach failed");
        first.back_pressure();
        assert_eq!(first.back_pressure_count(), 1);
        assert_eq!(second.back_pressure_count(), 0);
    }

    #[test]
    fn test_attach_rejects_file_too_short_for_instance_count() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join(FILE_NAME), vec![0u8; LENGTH])
            .expect("failed to create file");
        assert!(matches!(
            MappedSessionAdapterStats::attach(dir.path(), 1, 2),
            Err(mapping::Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_attach_rejects_oversized_shared_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join(FILE_NAME), vec![0u8; LENGTH * 3])
            .expect("failed to create file");
        assert!(matches!(
            MappedSessionAdapterStats::attach(dir.path(), 0, 2),
            Err(mapping::Error::SizeMismatch { .. })
        ));
    }
}
