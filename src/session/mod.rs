//! Per-session statistics files.
//!
//! Session containers create one append-only statistics file per session,
//! named `session-statistics-<id>.data`. This module owns the naming
//! convention, the fixed 56-byte little-endian entry format, and a reader
//! that delivers every complete entry from a caller-supplied byte offset.

mod error;

pub use error::{Error, Result};

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

pub const FILE_PREFIX: &str = "session-statistics-";
pub const FILE_SUFFIX: &str = ".data";

/// Recognizes dynamically created per-session statistics files by name.
pub fn is_session_statistics_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            name.starts_with(FILE_PREFIX)
                && name.ends_with(FILE_SUFFIX)
                && name.len() > FILE_PREFIX.len() + FILE_SUFFIX.len()
        })
}

/// One appended statistics entry; all fields little-endian u64 on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionStatisticsEntry {
    pub session_id: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub frames_decoded: u64,
    pub frames_encoded: u64,
    pub receive_buffered_bytes: u64,
    pub send_buffered_bytes: u64,
}

impl SessionStatisticsEntry {
    pub const LENGTH: usize = 56;

    /// Encodes the entry for appending; the producer side of the format.
    pub fn encode(&self) -> [u8; Self::LENGTH] {
        let mut raw = [0u8; Self::LENGTH];
        for (index, value) in [
            self.session_id,
            self.bytes_read,
            self.bytes_written,
            self.frames_decoded,
            self.frames_encoded,
            self.receive_buffered_bytes,
            self.send_buffered_bytes,
        ]
        .into_iter()
        .enumerate()
        {
            raw[index * 8..index * 8 + 8].copy_from_slice(&value.to_le_bytes());
        }
        raw
    }

    pub fn decode(raw: &[u8; Self::LENGTH]) -> Self {
        Self {
            session_id: u64_at(raw, 0),
            bytes_read: u64_at(raw, 8),
            bytes_written: u64_at(raw, 16),
            frames_decoded: u64_at(raw, 24),
            frames_encoded: u64_at(raw, 32),
            receive_buffered_bytes: u64_at(raw, 40),
            send_buffered_bytes: u64_at(raw, 48),
        }
    }
}

fn u64_at(raw: &[u8; SessionStatisticsEntry::LENGTH], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Reads every complete entry starting at byte `from_offset`, invoking
/// `on_entry` for each, and returns the offset just past the last complete
/// entry. A trailing partial entry is left for the next cycle, so a caller
/// that persists the returned offset delivers each entry exactly once.
///
/// # Errors
///
/// Returns [`Error::Open`] if the file cannot be opened and [`Error::Read`]
/// on any other I/O failure.
pub fn read_entries(
    path: &Path,
    from_offset: u64,
    mut on_entry: impl FnMut(&SessionStatisticsEntry),
) -> Result<u64> {
    let file = File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(from_offset))
        .map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut offset = from_offset;
    let mut raw = [0u8; SessionStatisticsEntry::LENGTH];
    loop {
        match reader.read_exact(&mut raw) {
            Ok(()) => {
                on_entry(&SessionStatisticsEntry::decode(&raw));
                offset += SessionStatisticsEntry::LENGTH as u64;
            }
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(source) => {
                return Err(Error::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(session_id: u64) -> SessionStatisticsEntry {
        SessionStatisticsEntry {
            session_id,
            bytes_read: 100,
            bytes_written: 200,
            frames_decoded: 10,
            frames_encoded: 20,
            receive_buffered_bytes: 0,
            send_buffered_bytes: 512,
        }
    }

    #[test]
    fn test_naming_convention() {
        assert!(is_session_statistics_file(Path::new(
            "/srv/instance-0/session-statistics-17.data"
        )));
        assert!(!is_session_statistics_file(Path::new(
            "/srv/instance-0/session-statistics-.data"
        )));
        assert!(!is_session_statistics_file(Path::new(
            "/srv/instance-0/session-container.mark"
        )));
        assert!(!is_session_statistics_file(Path::new(
            "/srv/instance-0/session-statistics-17.tmp"
        )));
    }

    #[test]
    fn test_entry_round_trip() {
        let original = entry(42);
        assert_eq!(SessionStatisticsEntry::decode(&original.encode()), original);
    }

    #[test]
    fn test_read_entries_from_offset() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("session-statistics-1.data");
        let mut file = File::create(&path).expect("failed to create file");
        file.write_all(&entry(1).encode()).expect("write failed");
        file.write_all(&entry(2).encode()).expect("write failed");

        let mut seen = Vec::new();
        let offset =
            read_entries(&path, 0, |e| seen.push(e.session_id)).expect("read_entries failed");
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(offset, 2 * SessionStatisticsEntry::LENGTH as u64);

        // nothing new, offset stays put
        let offset = read_entries(&path, offset, |_| panic!("no entry expected"))
            .expect("read_entries failed");
        assert_eq!(offset, 2 * SessionStatisticsEntry::LENGTH as u64);
    }

    #[test]
    fn test_partial_trailing_entry_is_deferred() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("session-statistics-2.data");
        let mut file = File::create(&path).expect("failed to create file");
        file.write_all(&entry(7).encode()).expect("write failed");
        file.write_all(&entry(8).encode()[..20]).expect("write failed");

        let mut seen = Vec::new();
        let offset =
            read_entries(&path, 0, |e| seen.push(e.session_id)).expect("read_entries failed");
        assert_eq!(seen, vec![7]);
        assert_eq!(offset, SessionStatisticsEntry::LENGTH as u64);

        // completing the entry makes it visible from the saved offset
        file.write_all(&entry(8).encode()[20..]).expect("write failed");
        let mut seen = Vec::new();
        read_entries(&path, offset, |e| seen.push(e.session_id)).expect("read_entries failed");
        assert_eq!(seen, vec![8]);
    }

    #[test]
    fn test_missing_file_is_an_open_error() {
        let result = read_entries(Path::new("/does/not/exist.data"), 0, |_| {});
        assert!(matches!(result, Err(Error::Open { .. })));
    }
}
