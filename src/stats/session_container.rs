//! Session-container statistics, embedded in the mark file data region.
//!
//! Field table (64 bytes):
//!
//! | field                        | offset | width | kind    |
//! |------------------------------|--------|-------|---------|
//! | bytes_read                   | 0      | 8     | counter |
//! | bytes_written                | 8      | 8     | counter |
//! | receive_back_pressure_events | 16     | 8     | counter |
//! | invalid_opcode_count         | 24     | 8     | counter |
//! | event_loop_duration_ms       | 32     | 8     | gauge   |
//! | max_event_loop_duration_ms   | 40     | 8     | gauge   |
//! | active_session_count         | 48     | 4     | gauge   |
//! | (padding)                    | 52     | 4     |         |
//! | heartbeat_ms                 | 56     | 8     |         |

use super::buffer::StatsBuffer;
use crate::mapping::MappedRegion;

const BYTES_READ_OFFSET: usize = 0;
const BYTES_WRITTEN_OFFSET: usize = BYTES_READ_OFFSET + 8;
const RECEIVE_BACK_PRESSURE_OFFSET: usize = BYTES_WRITTEN_OFFSET + 8;
const INVALID_OPCODE_OFFSET: usize = RECEIVE_BACK_PRESSURE_OFFSET + 8;
const EVENT_LOOP_DURATION_OFFSET: usize = INVALID_OPCODE_OFFSET + 8;
const MAX_EVENT_LOOP_DURATION_OFFSET: usize = EVENT_LOOP_DURATION_OFFSET + 8;
const ACTIVE_SESSION_COUNT_OFFSET: usize = MAX_EVENT_LOOP_DURATION_OFFSET + 8;
const HEARTBEAT_OFFSET: usize = ACTIVE_SESSION_COUNT_OFFSET + 8;

pub const LENGTH: usize = HEARTBEAT_OFFSET + 8;

#[derive(Debug)]
pub struct SessionContainerStats<B> {
    buffer: B,
    offset: usize,
    bytes_read: u64,
    bytes_written: u64,
    receive_back_pressure_events: u64,
    invalid_opcode_count: u64,
    max_event_loop_duration_ms: u64,
}

pub type MappedSessionContainerStats = SessionContainerStats<MappedRegion>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionContainerSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub receive_back_pressure_events: u64,
    pub invalid_opcode_count: u64,
    pub event_loop_duration_ms: u64,
    pub max_event_loop_duration_ms: u64,
    pub active_session_count: u32,
    pub heartbeat_ms: u64,
}

impl<B: StatsBuffer> SessionContainerStats<B> {
    pub fn new(buffer: B, offset: usize) -> Self {
        Self {
            buffer,
            offset,
            bytes_read: 0,
            bytes_written: 0,
            receive_back_pressure_events: 0,
            invalid_opcode_count: 0,
            max_event_loop_duration_ms: 0,
        }
    }

    pub fn bytes_read(&mut self, count: u64) {
        self.bytes_read += count;
        self.buffer
            .put_u64_ordered(self.offset + BYTES_READ_OFFSET, self.bytes_read);
    }

    pub fn bytes_written(&mut self, count: u64) {
        self.bytes_written += count;
        self.buffer
            .put_u64_ordered(self.offset + BYTES_WRITTEN_OFFSET, self.bytes_written);
    }

    pub fn receive_back_pressure(&mut self) {
        self.receive_back_pressure_events += 1;
        self.buffer.put_u64_ordered(
            self.offset + RECEIVE_BACK_PRESSURE_OFFSET,
            self.receive_back_pressure_events,
        );
    }

    pub fn invalid_opcode(&mut self) {
        self.invalid_opcode_count += 1;
        self.buffer.put_u64_ordered(
            self.offset + INVALID_OPCODE_OFFSET,
            self.invalid_opcode_count,
        );
    }

    /// Publishes the last event-loop duration and raises the high-watermark
    /// when exceeded.
    pub fn event_loop_duration_ms(&mut self, duration_ms: u64) {
        self.buffer
            .put_u64_ordered(self.offset + EVENT_LOOP_DURATION_OFFSET, duration_ms);
        if duration_ms > self.max_event_loop_duration_ms {
            self.max_event_loop_duration_ms = duration_ms;
            self.buffer
                .put_u64_ordered(self.offset + MAX_EVENT_LOOP_DURATION_OFFSET, duration_ms);
        }
    }

    pub fn active_session_count(&self, count: u32) {
        self.buffer
            .put_u32_ordered(self.offset + ACTIVE_SESSION_COUNT_OFFSET, count);
    }

    pub fn heartbeat(&self, time_ms: u64) {
        self.buffer
            .put_u64_ordered(self.offset + HEARTBEAT_OFFSET, time_ms);
    }

    /// Zeroes the monotonic counters; gauges, the high-watermark and the
    /// heartbeat are untouched.
    pub fn reset(&mut self) {
        self.bytes_read = 0;
        self.bytes_written = 0;
        self.receive_back_pressure_events = 0;
        self.invalid_opcode_count = 0;
        self.buffer
            .put_u64_ordered(self.offset + BYTES_READ_OFFSET, 0);
        self.buffer
            .put_u64_ordered(self.offset + BYTES_WRITTEN_OFFSET, 0);
        self.buffer
            .put_u64_ordered(self.offset + RECEIVE_BACK_PRESSURE_OFFSET, 0);
        self.buffer
            .put_u64_ordered(self.offset + INVALID_OPCODE_OFFSET, 0);
    }

    pub fn snapshot(&self) -> SessionContainerSnapshot {
        SessionContainerSnapshot {
            bytes_read: self.buffer.get_u64_volatile(self.offset + BYTES_READ_OFFSET),
            bytes_written: self
                .buffer
                .get_u64_volatile(self.offset + BYTES_WRITTEN_OFFSET),
            receive_back_pressure_events: self
                .buffer
                .get_u64_volatile(self.offset + RECEIVE_BACK_PRESSURE_OFFSET),
            invalid_opcode_count: self
                .buffer
                .get_u64_volatile(self.offset + INVALID_OPCODE_OFFSET),
            event_loop_duration_ms: self
                .buffer
                .get_u64_volatile(self.offset + EVENT_LOOP_DURATION_OFFSET),
            max_event_loop_duration_ms: self
                .buffer
                .get_u64_volatile(self.offset + MAX_EVENT_LOOP_DURATION_OFFSET),
            active_session_count: self
                .buffer
                .get_u32_volatile(self.offset + ACTIVE_SESSION_COUNT_OFFSET),
            heartbeat_ms: self.buffer.get_u64_volatile(self.offset + HEARTBEAT_OFFSET),
        }
    }
}

impl MappedSessionContainerStats {
    pub fn close(&mut self) -> crate::mapping::Result<()> {
        self.buffer.close()
    }
}

impl crate::mapping::Closeable for MappedSessionContainerStats {
    fn close(&mut self) -> crate::mapping::Result<()> {
        self.buffer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::HeapBuffer;

    fn heap_stats() -> SessionContainerStats<HeapBuffer> {
        SessionContainerStats::new(HeapBuffer::new(LENGTH), 0)
    }

    #[test]
    fn test_byte_counters_accumulate() {
        let mut stats = heap_stats();
        stats.bytes_read(10);
        stats.bytes_read(32);
        stats.bytes_written(7);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_read, 42);
        assert_eq!(snapshot.bytes_written, 7);
    }

    #[test]
    fn test_event_loop_watermark_only_rises() {
        let mut stats = heap_stats();
        stats.event_loop_duration_ms(30);
        stats.event_loop_duration_ms(10);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.event_loop_duration_ms, 10);
        assert_eq!(snapshot.max_event_loop_duration_ms, 30);
    }

    #[test]
    fn test_reset_scope() {
        let mut stats = heap_stats();
        stats.bytes_read(5);
        stats.bytes_written(5);
        stats.receive_back_pressure();
        stats.invalid_opcode();
        stats.event_loop_duration_ms(9);
        stats.active_session_count(3);
        stats.heartbeat(1_000);

        stats.reset();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.bytes_read, 0);
        assert_eq!(snapshot.bytes_written, 0);
        assert_eq!(snapshot.receive_back_pressure_events, 0);
        assert_eq!(snapshot.invalid_opcode_count, 0);
        assert_eq!(snapshot.event_loop_duration_ms, 9);
        assert_eq!(snapshot.max_event_loop_duration_ms, 9);
        assert_eq!(snapshot.active_session_count, 3);
        assert_eq!(snapshot.heartbeat_ms, 1_000);
    }

    #[test]
    fn test_codec_honours_base_offset() {
        let buffer = HeapBuffer::new(LENGTH + 64);
        let mut stats = SessionContainerStats::new(buffer, 64);
        stats.bytes_read(1);
        assert_eq!(stats.buffer.get_u64_volatile(64), 1);
        assert_eq!(stats.buffer.get_u64_volatile(0), 0);
    }
}
