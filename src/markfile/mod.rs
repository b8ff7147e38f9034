//! Mark file protocol.
//!
//! Every session-container instance owns one mark file in its instance
//! directory, combining a liveness header (written by an external
//! collaborator), the session-container statistics region and the error ring
//! buffer:
//!
//! ```text
//! [0 .. DATA_OFFSET)                             liveness header
//! [DATA_OFFSET .. +DATA_LENGTH)                  session-container statistics
//! [ERROR_BUFFER_OFFSET .. +ERROR_BUFFER_LENGTH)  error ring buffer
//! ```
//!
//! The statistics region and the error buffer are mapped independently, so
//! each can be released on its own during aggregate shutdown.

use std::path::Path;

use crate::errorbuf::ErrorBufferReader;
use crate::mapping::{self, Error, MappedRegion};
use crate::stats::session_container;
use crate::stats::MappedSessionContainerStats;

pub const MARK_FILE_NAME: &str = "session-container.mark";

pub const HEADER_LENGTH: usize = 64;
pub const DATA_OFFSET: usize = HEADER_LENGTH;
pub const DATA_LENGTH: usize = session_container::LENGTH;
pub const ERROR_BUFFER_OFFSET: usize = DATA_OFFSET + DATA_LENGTH;
pub const ERROR_BUFFER_LENGTH: usize = 64 * 1024;
pub const TOTAL_LENGTH: usize = ERROR_BUFFER_OFFSET + ERROR_BUFFER_LENGTH;

/// One instance's attached mark file regions.
#[derive(Debug)]
pub struct MarkFile {
    container_statistics: MappedSessionContainerStats,
    error_buffer: ErrorBufferReader,
}

impl MarkFile {
    /// Attaches to the mark file in `directory`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or its length is not exactly
    /// [`TOTAL_LENGTH`]; a partially mapped file is released before the error
    /// propagates.
    pub fn attach(directory: &Path) -> mapping::Result<Self> {
        let path = directory.join(MARK_FILE_NAME);
        let metadata = std::fs::metadata(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::Missing { path: path.clone() }
            } else {
                Error::Open {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        if metadata.len() != TOTAL_LENGTH as u64 {
            return Err(Error::SizeMismatch {
                path,
                expected: TOTAL_LENGTH as u64,
                actual: metadata.len(),
            });
        }
        let data_region = MappedRegion::attach_at(&path, DATA_OFFSET, DATA_LENGTH)?;
        let error_region = MappedRegion::attach_at(&path, ERROR_BUFFER_OFFSET, ERROR_BUFFER_LENGTH)?;
        Ok(Self {
            container_statistics: MappedSessionContainerStats::new(data_region, 0),
            error_buffer: ErrorBufferReader::new(error_region),
        })
    }

    pub fn container_statistics(&self) -> &MappedSessionContainerStats {
        &self.container_statistics
    }

    pub fn container_statistics_mut(&mut self) -> &mut MappedSessionContainerStats {
        &mut self.container_statistics
    }

    pub fn error_buffer(&self) -> &ErrorBufferReader {
        &self.error_buffer
    }

    /// The independently releasable regions behind this mark file.
    pub(crate) fn closeables(&mut self) -> [&mut dyn mapping::Closeable; 2] {
        [&mut self.container_statistics, &mut self.error_buffer]
    }

    /// Releases both regions, attempting the second even when the first
    /// fails. Idempotent.
    pub fn close(&mut self) -> std::result::Result<(), Vec<mapping::Error>> {
        let failures = mapping::close_all(self.closeables());
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_mark_file(directory: &Path) {
        std::fs::write(directory.join(MARK_FILE_NAME), vec![0u8; TOTAL_LENGTH])
            .expect("failed to create mark file");
    }

    #[test]
    fn test_attach_missing_mark_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        assert!(matches!(
            MarkFile::attach(dir.path()),
            Err(Error::Missing { .. })
        ));
    }

    #[test]
    fn test_attach_rejects_wrong_total_length() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        std::fs::write(dir.path().join(MARK_FILE_NAME), vec![0u8; TOTAL_LENGTH - 1])
            .expect("failed to create mark file");
        assert!(matches!(
            MarkFile::attach(dir.path()),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_fresh_mark_file_reads_zero() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        create_mark_file(dir.path());
        let mark_file = MarkFile::attach(dir.path()).expect("attach failed");
        let snapshot = mark_file.container_statistics().snapshot();
        assert_eq!(snapshot.bytes_read, 0);
        assert_eq!(snapshot.heartbeat_ms, 0);
        assert!(mark_file.error_buffer().read().is_empty());
    }

    #[test]
    fn test_writer_and_reader_views_share_the_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        create_mark_file(dir.path());
        let mut writer = MarkFile::attach(dir.path()).expect("attach failed");
        let reader = MarkFile::attach(dir.path()).expect("attach failed");
        writer.container_statistics_mut().bytes_read(128);
        writer.container_statistics_mut().heartbeat(5_000);
        let snapshot = reader.container_statistics().snapshot();
        assert_eq!(snapshot.bytes_read, 128);
        assert_eq!(snapshot.heartbeat_ms, 5_000);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        create_mark_file(dir.path());
        let mut mark_file = MarkFile::attach(dir.path()).expect("attach failed");
        mark_file.close().expect("first close failed");
        mark_file.close().expect("second close should be a no-op");
    }
}
