//! Distinct-error ring buffer embedded in the mark file.
//!
//! Record layout, 8-byte aligned:
//!
//! ```text
//! 0   length                          i32  total record length incl. header; 0 = end of log
//! 4   observation_count               i32
//! 8   last_observation_timestamp_ms   u64
//! 16  first_observation_timestamp_ms  u64
//! 24  message                         UTF-8, (length - 24) bytes
//! ```
//!
//! The producer appends records and republishes observation counts; this side
//! only ever reads. The record length is acquire-loaded so a fully written
//! record is visible before its payload is copied; the payload copy itself is
//! plain, so a message raced mid-update may read torn. That is tolerated.

use crate::mapping::{self, MappedRegion};

const LENGTH_OFFSET: usize = 0;
const OBSERVATION_COUNT_OFFSET: usize = 4;
const LAST_OBSERVATION_TIMESTAMP_OFFSET: usize = 8;
const FIRST_OBSERVATION_TIMESTAMP_OFFSET: usize = 16;

pub const ENCODED_ERROR_OFFSET: usize = 24;
pub const RECORD_ALIGNMENT: usize = 8;

/// One distinct error, observed one or more times.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorRecord {
    pub observation_count: u32,
    pub first_observation_timestamp_ms: u64,
    pub last_observation_timestamp_ms: u64,
    pub message: String,
}

/// All records of one instance's error buffer at poll time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ErrorBufferSnapshot {
    pub records: Vec<ErrorRecord>,
}

/// Read-only view over one instance's error ring region.
#[derive(Debug)]
pub struct ErrorBufferReader {
    region: MappedRegion,
}

impl ErrorBufferReader {
    pub fn new(region: MappedRegion) -> Self {
        Self { region }
    }

    /// Scans the buffer and returns every complete record, oldest first.
    /// Stops at the first zero-length slot or a record that would overrun
    /// the region. Never mutates the buffer.
    pub fn read(&self) -> Vec<ErrorRecord> {
        let mut records = Vec::new();
        let mut offset = 0;
        while offset + ENCODED_ERROR_OFFSET <= self.region.len() {
            let length = self.region.get_u32(offset + LENGTH_OFFSET) as usize;
            if length == 0 {
                break;
            }
            if length < ENCODED_ERROR_OFFSET || offset + length > self.region.len() {
                log::warn!(
                    target: "error-buffer",
                    "malformed error record at offset {offset} in `{}`, aborting scan",
                    self.region.path().display()
                );
                break;
            }
            let mut message = vec![0u8; length - ENCODED_ERROR_OFFSET];
            self.region
                .read_bytes(offset + ENCODED_ERROR_OFFSET, &mut message);
            records.push(ErrorRecord {
                observation_count: self.region.get_u32(offset + OBSERVATION_COUNT_OFFSET),
                first_observation_timestamp_ms: self
                    .region
                    .get_u64(offset + FIRST_OBSERVATION_TIMESTAMP_OFFSET),
                last_observation_timestamp_ms: self
                    .region
                    .get_u64(offset + LAST_OBSERVATION_TIMESTAMP_OFFSET),
                message: String::from_utf8_lossy(&message).into_owned(),
            });
            offset += length.next_multiple_of(RECORD_ALIGNMENT);
        }
        records
    }

    pub fn close(&mut self) -> mapping::Result<()> {
        self.region.close()
    }
}

impl mapping::Closeable for ErrorBufferReader {
    fn close(&mut self) -> mapping::Result<()> {
        self.region.close()
    }
}
