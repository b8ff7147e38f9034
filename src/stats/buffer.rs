//! Storage seam for the statistics codecs.
//!
//! Codecs are generic over [`StatsBuffer`] so the same field tables and
//! accessor discipline run against a cross-process [`MappedRegion`] in
//! production and an in-process [`HeapBuffer`] in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::mapping::MappedRegion;

/// Scalar field storage with release-store / acquire-load semantics.
pub trait StatsBuffer {
    fn put_u64_ordered(&self, offset: usize, value: u64);
    fn get_u64_volatile(&self, offset: usize) -> u64;
    fn put_u32_ordered(&self, offset: usize, value: u32);
    fn get_u32_volatile(&self, offset: usize) -> u32;
}

impl StatsBuffer for MappedRegion {
    fn put_u64_ordered(&self, offset: usize, value: u64) {
        self.put_u64(offset, value);
    }

    fn get_u64_volatile(&self, offset: usize) -> u64 {
        self.get_u64(offset)
    }

    fn put_u32_ordered(&self, offset: usize, value: u32) {
        self.put_u32(offset, value);
    }

    fn get_u32_volatile(&self, offset: usize) -> u32 {
        self.get_u32(offset)
    }
}

/// In-memory stand-in for a mapped region, selected at codec construction in
/// tests and anywhere a process-local sink is wanted.
#[derive(Debug)]
pub struct HeapBuffer {
    words: Vec<AtomicU64>,
}

impl HeapBuffer {
    /// Creates a zeroed buffer of at least `len` bytes.
    pub fn new(len: usize) -> Self {
        Self {
            words: (0..len.div_ceil(8)).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

impl StatsBuffer for HeapBuffer {
    fn put_u64_ordered(&self, offset: usize, value: u64) {
        debug_assert_eq!(offset % 8, 0);
        self.words[offset / 8].store(value, Ordering::Release);
    }

    fn get_u64_volatile(&self, offset: usize) -> u64 {
        debug_assert_eq!(offset % 8, 0);
        self.words[offset / 8].load(Ordering::Acquire)
    }

    fn put_u32_ordered(&self, offset: usize, value: u32) {
        debug_assert_eq!(offset % 4, 0);
        let word = &self.words[offset / 8];
        let shift = (offset % 8) * 8;
        let mask = (u32::MAX as u64) << shift;
        let current = word.load(Ordering::Acquire);
        word.store((current & !mask) | ((value as u64) << shift), Ordering::Release);
    }

    fn get_u32_volatile(&self, offset: usize) -> u32 {
        debug_assert_eq!(offset % 4, 0);
        let shift = (offset % 8) * 8;
        (self.words[offset / 8].load(Ordering::Acquire) >> shift) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_buffer_u32_halves_are_independent() {
        let buffer = HeapBuffer::new(8);
        buffer.put_u32_ordered(0, 1);
        buffer.put_u32_ordered(4, 2);
        assert_eq!(buffer.get_u32_volatile(0), 1);
        assert_eq!(buffer.get_u32_volatile(4), 2);
        buffer.put_u32_ordered(0, 3);
        assert_eq!(buffer.get_u32_volatile(4), 2);
    }

    #[test]
    fn test_heap_buffer_u64_round_trip() {
        let buffer = HeapBuffer::new(24);
        buffer.put_u64_ordered(16, u64::MAX);
        assert_eq!(buffer.get_u64_volatile(16), u64::MAX);
    }
}
