//! Application-adapter statistics region.
//!
//! Field table (40 bytes, all 8-byte fields naturally aligned):
//!
//! | field                       | offset | width |
//! |-----------------------------|--------|-------|
//! | poll_limit_reached_count    | 0      | 8     |
//! | proxy_back_pressure_count   | 8      | 8     |
//! | proxy_back_pressured        | 16     | 4     |
//! | (padding)                   | 20     | 4     |
//! | event_loop_duration_ms      | 24     | 8     |
//! | heartbeat_ms                | 32     | 8     |

use std::path::Path;

use crate::mapping::{self, MappedRegion};

use super::back_pressure;
use super::buffer::StatsBuffer;

pub const FILE_NAME: &str = "application-adapter-stats.data";

const POLL_LIMIT_REACHED_OFFSET: usize = 0;
const PROXY_BACK_PRESSURE_COUNT_OFFSET: usize = POLL_LIMIT_REACHED_OFFSET + 8;
const PROXY_BACK_PRESSURED_OFFSET: usize = PROXY_BACK_PRESSURE_COUNT_OFFSET + 8;
const EVENT_LOOP_DURATION_OFFSET: usize = PROXY_BACK_PRESSURED_OFFSET + 8;
const HEARTBEAT_OFFSET: usize = EVENT_LOOP_DURATION_OFFSET + 8;

pub const LENGTH: usize = HEARTBEAT_OFFSET + 8;

/// Codec over the application-adapter statistics region.
///
/// The writer side keeps in-process shadow values for the monotonic counters
/// and publishes each bump with an ordered store; the reader side only ever
/// performs volatile loads. There is no cross-field atomicity.
#[derive(Debug)]
pub struct ApplicationAdapterStats<B> {
    buffer: B,
    offset: usize,
    poll_limit_reached_count: u64,
    proxy_back_pressure_count: u64,
}

pub type MappedApplicationAdapterStats = ApplicationAdapterStats<MappedRegion>;

/// Point-in-time view of the application-adapter region. Individual fields
/// are consistent; the set as a whole may be torn.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ApplicationAdapterSnapshot {
    pub poll_limit_reached_count: u64,
    pub proxy_back_pressure_count: u64,
    pub proxy_back_pressured: bool,
    pub event_loop_duration_ms: u64,
    pub heartbeat_ms: u64,
}

impl<B: StatsBuffer> ApplicationAdapterStats<B> {
    pub fn new(buffer: B, offset: usize) -> Self {
        Self {
            buffer,
            offset,
            poll_limit_reached_count: 0,
            proxy_back_pressure_count: 0,
        }
    }

    /// Records that the adapter hit its poll limit.
    pub fn adapter_poll_limit_reached(&mut self) {
        self.poll_limit_reached_count += 1;
        self.buffer.put_u64_ordered(
            self.offset + POLL_LIMIT_REACHED_OFFSET,
            self.poll_limit_reached_count,
        );
    }

    /// Records one proxy back-pressure event.
    pub fn proxy_back_pressure(&mut self) {
        self.proxy_back_pressure_count += 1;
        self.buffer.put_u64_ordered(
            self.offset + PROXY_BACK_PRESSURE_COUNT_OFFSET,
            self.proxy_back_pressure_count,
        );
    }

    /// Publishes the current back-pressure status flag.
    pub fn proxy_back_pressured(&self, status: u32) {
        self.buffer
            .put_u32_ordered(self.offset + PROXY_BACK_PRESSURED_OFFSET, status);
    }

    /// Publishes the duration of the last event-loop iteration.
    pub fn event_loop_duration_ms(&self, duration_ms: u64) {
        self.buffer
            .put_u64_ordered(self.offset + EVENT_LOOP_DURATION_OFFSET, duration_ms);
    }

    /// Publishes a liveness timestamp. Consumers infer a stalled producer
    /// from a heartbeat that stops advancing.
    pub fn heartbeat(&self, time_ms: u64) {
        self.buffer
            .put_u64_ordered(self.offset + HEARTBEAT_OFFSET, time_ms);
    }

    /// Zeroes the monotonic counters. Gauges and the heartbeat are left
    /// untouched. Writer-only, used on producer restart.
    pub fn reset(&mut self) {
        self.poll_limit_reached_count = 0;
        self.proxy_back_pressure_count = 0;
        self.buffer
            .put_u64_ordered(self.offset + POLL_LIMIT_REACHED_OFFSET, 0);
        self.buffer
            .put_u64_ordered(self.offset + PROXY_BACK_PRESSURE_COUNT_OFFSET, 0);
    }

    pub fn poll_limit_reached_count(&self) -> u64 {
        self.buffer
            .get_u64_volatile(self.offset + POLL_LIMIT_REACHED_OFFSET)
    }

    pub fn proxy_back_pressure_count(&self) -> u64 {
        self.buffer
            .get_u64_volatile(self.offset + PROXY_BACK_PRESSURE_COUNT_OFFSET)
    }

    pub fn is_proxy_back_pressured(&self) -> bool {
        self.buffer
            .get_u32_volatile(self.offset + PROXY_BACK_PRESSURED_OFFSET)
            != back_pressure::NOT_BACK_PRESSURED
    }

    /// One volatile load per field.
    pub fn snapshot(&self) -> ApplicationAdapterSnapshot {
        ApplicationAdapterSnapshot {
            poll_limit_reached_count: self.poll_limit_reached_count(),
            proxy_back_pressure_count: self.proxy_back_pressure_count(),
            proxy_back_pressured: self.is_proxy_back_pressured(),
            event_loop_duration_ms: self
                .buffer
                .get_u64_volatile(self.offset + EVENT_LOOP_DURATION_OFFSET),
            heartbeat_ms: self.buffer.get_u64_volatile(self.offset + HEARTBEAT_OFFSET),
        }
    }
}

impl MappedApplicationAdapterStats {
    /// Attaches to the shared adapter statistics file in `directory`.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing or not exactly [`LENGTH`] bytes.
    pub fn attach(directory: &Path) -> mapping::Result<Self> {
        let region = MappedRegion::attach(directory.join(FILE_NAME), LENGTH)?;
        Ok(Self::new(region, 0))
    }

    pub fn close(&mut self) -> mapping::Result<()> {
        self.buffer.close()
    }
}

impl mapping::Closeable for MappedApplicationAdapterStats {
    fn close(&mut self) -> mapping::Result<()> {
        self.buffer.close()
    }
}
