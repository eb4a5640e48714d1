//! Ring Buffer
//!
//! Fixed-capacity single-producer/single-consumer sample queue shared
//! between the audio device callback and the media send/receive paths.
//!
//! Indices run modulo `2 * capacity` so a full buffer and an empty one are
//! distinguishable without a spare slot. The writer stores samples and then
//! publishes its index with `Release`; the reader loads that index with
//! `Acquire` before touching the samples, and the same holds in reverse.
//! [`AudioRing::split`] hands out exactly one [`RingProducer`] and one
//! [`RingConsumer`], so a ring can never gain a second writer or reader.

use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::Sample;

struct Shared {
    buffer: Box<[AtomicI16]>,
    capacity: usize,
    /// Mask for the 2x-capacity index space
    big_mask: usize,
    /// Mask for a slot within the buffer
    small_mask: usize,
    write_index: AtomicUsize,
    read_index: AtomicUsize,
}

impl Shared {
    fn read_available(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        write.wrapping_sub(read) & self.big_mask
    }

    fn write_available(&self) -> usize {
        self.capacity - self.read_available()
    }
}

/// A lock-free audio sample ring
pub struct AudioRing {
    shared: Arc<Shared>,
}

impl AudioRing {
    /// Create a ring holding `capacity` samples
    ///
    /// Capacity must be a power of 2.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() || capacity > usize::MAX / 4 {
            return Err(Error::InvalidCapacity(capacity));
        }

        let buffer = (0..capacity).map(|_| AtomicI16::new(0)).collect::<Vec<_>>();

        Ok(Self {
            shared: Arc::new(Shared {
                buffer: buffer.into_boxed_slice(),
                capacity,
                big_mask: capacity * 2 - 1,
                small_mask: capacity - 1,
                write_index: AtomicUsize::new(0),
                read_index: AtomicUsize::new(0),
            }),
        })
    }

    /// Capacity for `frame_samples`-sized frames: ten frames rounded up to a power of 2
    pub fn capacity_for_frames(frame_samples: usize) -> usize {
        (frame_samples.max(1) * 10).next_power_of_two()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn read_available(&self) -> usize {
        self.shared.read_available()
    }

    pub fn write_available(&self) -> usize {
        self.shared.write_available()
    }

    /// Split into the single writer and the single reader
    pub fn split(self) -> (RingProducer, RingConsumer) {
        (
            RingProducer {
                shared: self.shared.clone(),
            },
            RingConsumer { shared: self.shared },
        )
    }
}

/// The writing half of an [`AudioRing`]
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// Copy as many samples as fit and return how many were written.
    ///
    /// A short write drops the remainder.
    pub fn write(&mut self, samples: &[Sample]) -> usize {
        let shared = &*self.shared;
        let count = samples.len().min(shared.write_available());
        if count == 0 {
            return 0;
        }

        let write = shared.write_index.load(Ordering::Relaxed);
        for (i, sample) in samples[..count].iter().enumerate() {
            shared.buffer[(write + i) & shared.small_mask].store(*sample, Ordering::Relaxed);
        }
        shared
            .write_index
            .store((write + count) & shared.big_mask, Ordering::Release);

        if count < samples.len() {
            trace!("ring full, dropped {} samples", samples.len() - count);
        }
        count
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn read_available(&self) -> usize {
        self.shared.read_available()
    }

    pub fn write_available(&self) -> usize {
        self.shared.write_available()
    }
}

/// The reading half of an [`AudioRing`]
pub struct RingConsumer {
    shared: Arc<Shared>,
}

impl RingConsumer {
    /// Copy up to `out.len()` samples and return how many were read.
    ///
    /// Zero means no data yet.
    pub fn read(&mut self, out: &mut [Sample]) -> usize {
        let shared = &*self.shared;
        let count = out.len().min(shared.read_available());
        if count == 0 {
            return 0;
        }

        let read = shared.read_index.load(Ordering::Relaxed);
        for (i, slot) in out[..count].iter_mut().enumerate() {
            *slot = shared.buffer[(read + i) & shared.small_mask].load(Ordering::Relaxed);
        }
        shared
            .read_index
            .store((read + count) & shared.big_mask, Ordering::Release);

        count
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn read_available(&self) -> usize {
        self.shared.read_available()
    }

    pub fn write_available(&self) -> usize {
        self.shared.write_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_capacity_must_be_power_of_two() {
        assert_eq!(AudioRing::new(0).err(), Some(Error::InvalidCapacity(0)));
        assert_eq!(AudioRing::new(1000).err(), Some(Error::InvalidCapacity(1000)));
        assert_eq!(AudioRing::new(1024).unwrap().capacity(), 1024);
    }

    #[test]
    fn test_capacity_for_frames() {
        assert_eq!(AudioRing::capacity_for_frames(960), 16384);
        assert_eq!(AudioRing::capacity_for_frames(160), 2048);
    }

    #[test]
    fn test_empty_read_returns_zero() {
        let (_tx, mut rx) = AudioRing::new(8).unwrap().split();
        let mut out = [0; 4];
        assert_eq!(rx.read(&mut out), 0);
        assert_eq!(rx.read_available(), 0);
        assert_eq!(rx.write_available(), 8);
    }

    #[test]
    fn test_full_ring_is_distinguishable_from_empty() {
        let (mut tx, mut rx) = AudioRing::new(4).unwrap().split();
        assert_eq!(tx.write(&[1, 2, 3, 4]), 4);
        assert_eq!(tx.read_available(), 4);
        assert_eq!(tx.write_available(), 0);
        assert_eq!(tx.write(&[5]), 0);

        let mut out = [0; 4];
        assert_eq!(rx.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_wraps_around_the_buffer_end() {
        let (mut tx, mut rx) = AudioRing::new(4).unwrap().split();
        let mut out = [0; 3];
        for round in 0..10i16 {
            let data = [round, round + 1, round + 2];
            assert_eq!(tx.write(&data), 3);
            assert_eq!(rx.read(&mut out), 3);
            assert_eq!(out, data);
        }
    }

    #[test]
    fn test_overflow_write_is_truncated() {
        let capacity = 16;
        let present = 5;
        let (mut tx, _rx) = AudioRing::new(capacity).unwrap().split();
        tx.write(&vec![1; present]);

        let written = tx.write(&vec![2; capacity + 10]);
        assert_eq!(written, capacity - present);
        assert_eq!(tx.read_available(), capacity);
    }

    #[test]
    fn test_concurrent_producer_consumer_preserve_order() {
        let (mut tx, mut rx) = AudioRing::new(64).unwrap().split();
        const TOTAL: usize = 100_000;

        let producer = std::thread::spawn(move || {
            let mut next = 0usize;
            while next < TOTAL {
                let chunk: Vec<Sample> = (next..(next + 7).min(TOTAL)).map(|v| v as Sample).collect();
                let written = tx.write(&chunk);
                next += written;
                if written == 0 {
                    std::thread::yield_now();
                }
            }
        });

        let mut expected = 0usize;
        let mut out = [0; 13];
        while expected < TOTAL {
            let n = rx.read(&mut out);
            for sample in &out[..n] {
                assert_eq!(*sample, expected as Sample);
                expected += 1;
            }
            if n == 0 {
                std::thread::yield_now();
            }
        }

        producer.join().unwrap();
    }

    #[derive(Debug, Clone)]
    enum Op {
        Write(Vec<Sample>),
        Read(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec(any::<Sample>(), 0..40).prop_map(Op::Write),
            (0usize..40).prop_map(Op::Read),
        ]
    }

    proptest! {
        #[test]
        fn reads_return_a_prefix_of_writes(ops in prop::collection::vec(op(), 1..200)) {
            let (mut tx, mut rx) = AudioRing::new(32).unwrap().split();
            let mut accepted = Vec::new();
            let mut returned = Vec::new();

            for op in ops {
                match op {
                    Op::Write(samples) => {
                        let n = tx.write(&samples);
                        accepted.extend_from_slice(&samples[..n]);
                    }
                    Op::Read(len) => {
                        let mut out = vec![0; len];
                        let n = rx.read(&mut out);
                        returned.extend_from_slice(&out[..n]);
                    }
                }
                prop_assert_eq!(tx.read_available() + tx.write_available(), 32);
                prop_assert_eq!(rx.read_available(), accepted.len() - returned.len());
            }

            prop_assert_eq!(&accepted[..returned.len()], &returned[..]);
        }
    }
}
