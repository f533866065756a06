//! Ring-buffer plumbing shared by the result and status readers.
//!
//! [`memory_ring`] builds an in-process ring over a page-aligned buffer: the
//! [`RingProducer`] half is handed to whatever fills the slots (a worker
//! thread standing in for the accelerator, or a test), the [`MemoryRing`]
//! half implements [`SlotRing`] for the readers.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use bytemuck::Pod;
use lmrt_core::{Accelerator, PageBuffer, RunError, SlotRing, StreamError};

use crate::config::StreamConfig;

/// Running totals for one ring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingStats {
    pub written: u64,
    pub read: u64,
    pub discarded: u64,
}

struct RingState {
    storage: PageBuffer,
    num_slots: usize,
    slot_size: usize,
    /// Oldest slot not yet discarded
    head: usize,
    /// Slots written and not yet discarded
    filled: usize,
    /// Slots handed to the consumer and not yet discarded
    taken: usize,
    closed: bool,
    stats: RingStats,
}

impl RingState {
    fn slot_bytes(&self, index: usize) -> &[u8] {
        let start = (index % self.num_slots) * self.slot_size;
        &self.storage.as_bytes()[start..start + self.slot_size]
    }
}

struct Shared {
    name: String,
    state: Mutex<RingState>,
    space: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a ring of `num_slots` slots of `slot_size` bytes stored in `backing`.
pub fn memory_ring(
    name: &str,
    num_slots: usize,
    slot_size: usize,
    backing: PageBuffer,
) -> Result<(RingProducer, MemoryRing), StreamError> {
    if num_slots == 0 || slot_size == 0 {
        return Err(StreamError::NoSlots(name.to_string()));
    }
    let needed = num_slots * slot_size;
    if backing.len() < needed {
        return Err(StreamError::BackingTooSmall {
            name: name.to_string(),
            needed,
            actual: backing.len(),
        });
    }

    let shared = Arc::new(Shared {
        name: name.to_string(),
        state: Mutex::new(RingState {
            storage: backing,
            num_slots,
            slot_size,
            head: 0,
            filled: 0,
            taken: 0,
            closed: false,
            stats: RingStats::default(),
        }),
        space: Condvar::new(),
    });

    let producer = RingProducer {
        shared: Arc::clone(&shared),
    };
    let consumer = MemoryRing {
        shared,
        num_slots,
        slot_size,
        scratch: Vec::with_capacity(slot_size),
    };
    Ok((producer, consumer))
}

/// Writing half of a [`memory_ring`].
#[derive(Clone)]
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// Write one slot, blocking while the ring is full.
    ///
    /// Slots shorter than the ring's slot size are zero-extended; longer ones
    /// are rejected. Fails once the consuming [`MemoryRing`] has been dropped.
    pub fn push(&self, slot: &[u8]) -> Result<(), RunError> {
        let mut state = self.shared.lock();
        self.check_fits(&state, slot)?;
        while state.filled == state.num_slots && !state.closed {
            state = self
                .shared
                .space
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        self.write_locked(&mut state, slot)
    }

    /// Write one slot if there is room; returns `Ok(false)` when full.
    pub fn try_push(&self, slot: &[u8]) -> Result<bool, RunError> {
        let mut state = self.shared.lock();
        if state.filled == state.num_slots && !state.closed {
            return Ok(false);
        }
        self.write_locked(&mut state, slot).map(|()| true)
    }

    /// Write a record as one slot, blocking while the ring is full.
    pub fn push_record<T: Pod>(&self, record: &T) -> Result<(), RunError> {
        self.push(bytemuck::bytes_of(record))
    }

    fn write_locked(&self, state: &mut RingState, slot: &[u8]) -> Result<(), RunError> {
        if state.closed {
            return Err(RunError::StreamClosed(self.shared.name.clone()));
        }

        self.check_fits(state, slot)?;

        let index = (state.head + state.filled) % state.num_slots;
        let slot_size = state.slot_size;
        let start = index * slot_size;

        let target = &mut state.storage.as_bytes_mut()[start..start + slot_size];
        target.fill(0);
        target[..slot.len()].copy_from_slice(slot);

        state.filled += 1;
        state.stats.written += 1;
        Ok(())
    }

    fn check_fits(&self, state: &RingState, slot: &[u8]) -> Result<(), RunError> {
        if slot.len() > state.slot_size {
            return Err(RunError::SlotOverflow {
                name: self.shared.name.clone(),
                len: slot.len(),
                slot_size: state.slot_size,
            });
        }
        Ok(())
    }

    pub fn stats(&self) -> RingStats {
        self.shared.lock().stats
    }

    /// Slots written and not yet released by the consumer.
    pub fn pending(&self) -> usize {
        self.shared.lock().filled
    }
}

/// Reading half of a [`memory_ring`].
pub struct MemoryRing {
    shared: Arc<Shared>,
    num_slots: usize,
    slot_size: usize,
    scratch: Vec<u8>,
}

impl SlotRing for MemoryRing {
    fn num_slots(&self) -> usize {
        self.num_slots
    }

    fn slot_size(&self) -> usize {
        self.slot_size
    }

    fn read(&mut self, max_slots: usize) -> (usize, &[u8]) {
        self.scratch.clear();

        let mut state = self.shared.lock();
        let ready = state.filled - state.taken;
        let count = ready.min(max_slots);
        for i in 0..count {
            let index = state.head + state.taken + i;
            self.scratch.extend_from_slice(state.slot_bytes(index));
        }
        state.taken += count;
        state.stats.read += count as u64;
        drop(state);

        (count, &self.scratch)
    }

    fn discard(&mut self, count: usize) {
        let mut state = self.shared.lock();
        if count > state.taken {
            log::warn!(
                "Stream {}: discarding {} slots but only {} were read",
                self.shared.name,
                count,
                state.taken
            );
        }
        let count = count.min(state.taken);

        state.head = (state.head + count) % state.num_slots;
        state.filled -= count;
        state.taken -= count;
        state.stats.discarded += count as u64;
        drop(state);

        self.shared.space.notify_all();
    }
}

impl Drop for MemoryRing {
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.space.notify_all();
    }
}

/// Set up the ring for `config` on the accelerator.
///
/// Fails with [`StreamError::Unavailable`] if the design has no such stream.
pub fn open_ring<A: Accelerator + ?Sized>(
    accelerator: &A,
    config: &StreamConfig,
    expected_slot_size: usize,
) -> Result<Box<dyn SlotRing>, StreamError> {
    if !accelerator.has_stream(&config.name) {
        return Err(StreamError::Unavailable(config.name.clone()));
    }
    if config.slot_size != expected_slot_size {
        return Err(StreamError::SlotSizeMismatch {
            name: config.name.clone(),
            expected: expected_slot_size,
            actual: config.slot_size,
        });
    }
    if config.num_slots == 0 {
        return Err(StreamError::NoSlots(config.name.clone()));
    }

    let backing = PageBuffer::zeroed(config.buffer_size());
    accelerator.setup_stream(&config.name, config.num_slots, config.slot_size, backing)
}

/// Read up to `max_slots` slots, hand each to `decode`, then discard exactly
/// as many slots as were read.
///
/// Returns the number of slots consumed; zero when nothing was ready.
pub fn poll_ring<F>(ring: &mut dyn SlotRing, max_slots: usize, mut decode: F) -> usize
where
    F: FnMut(&[u8]),
{
    let slot_size = ring.slot_size();
    let (num_read, data) = ring.read(max_slots);
    for slot in data.chunks_exact(slot_size).take(num_read) {
        decode(slot);
    }
    ring.discard(num_read);
    num_read
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn ring(num_slots: usize) -> (RingProducer, MemoryRing) {
        memory_ring("test_out", num_slots, 4, PageBuffer::zeroed(num_slots * 4)).unwrap()
    }

    #[test]
    fn test_empty_read_is_non_blocking() {
        let (_producer, mut consumer) = ring(4);
        let (count, data) = consumer.read(1);
        assert_eq!(count, 0);
        assert!(data.is_empty());
    }

    #[test]
    fn test_fifo_order_and_wraparound() {
        let (producer, mut consumer) = ring(3);
        let mut seen = Vec::new();

        for value in 0u32..10 {
            producer.push_record(&value).unwrap();
            poll_ring(&mut consumer, 1, |slot| {
                seen.push(bytemuck::pod_read_unaligned::<u32>(slot));
            });
        }

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_read_does_not_repeat_taken_slots() {
        let (producer, mut consumer) = ring(4);
        producer.push_record(&1u32).unwrap();
        producer.push_record(&2u32).unwrap();

        let (count, data) = consumer.read(1);
        assert_eq!(count, 1);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(data), 1);

        // Second read before discard hands out the next slot, not the same one
        let (count, data) = consumer.read(1);
        assert_eq!(count, 1);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(data), 2);

        consumer.discard(2);
        assert_eq!(producer.pending(), 0);
    }

    #[test]
    fn test_full_ring_rejects_try_push_until_discard() {
        let (producer, mut consumer) = ring(2);
        assert!(producer.try_push(&[1, 0, 0, 0]).unwrap());
        assert!(producer.try_push(&[2, 0, 0, 0]).unwrap());
        assert!(!producer.try_push(&[3, 0, 0, 0]).unwrap());

        // Reading alone does not free space
        let (count, _) = consumer.read(1);
        assert_eq!(count, 1);
        assert!(!producer.try_push(&[3, 0, 0, 0]).unwrap());

        consumer.discard(1);
        assert!(producer.try_push(&[3, 0, 0, 0]).unwrap());
    }

    #[test]
    fn test_discard_pairs_with_read() {
        let (producer, mut consumer) = ring(8);
        for value in 0u32..5 {
            producer.push_record(&value).unwrap();
        }

        let mut total = 0;
        loop {
            let n = poll_ring(&mut consumer, 2, |_| {});
            if n == 0 {
                break;
            }
            total += n;
        }

        let stats = producer.stats();
        assert_eq!(total, 5);
        assert_eq!(stats.written, 5);
        assert_eq!(stats.read, 5);
        assert_eq!(stats.discarded, stats.read);
    }

    #[test]
    fn test_blocked_producer_resumes_after_discard() {
        let (producer, mut consumer) = ring(2);
        let worker = thread::spawn(move || {
            for value in 0u32..16 {
                producer.push_record(&value).unwrap();
            }
        });

        let mut seen = Vec::new();
        while seen.len() < 16 {
            poll_ring(&mut consumer, 1, |slot| {
                seen.push(bytemuck::pod_read_unaligned::<u32>(slot));
            });
            thread::yield_now();
        }
        worker.join().unwrap();

        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_dropped_consumer_unblocks_producer() {
        let (producer, consumer) = ring(1);
        producer.push_record(&7u32).unwrap();
        drop(consumer);

        assert!(matches!(
            producer.push_record(&8u32),
            Err(RunError::StreamClosed(name)) if name == "test_out"
        ));
    }

    #[test]
    fn test_short_slot_is_zero_extended() {
        let (producer, mut consumer) = ring(1);
        producer.push(&[0xff; 4]).unwrap();
        poll_ring(&mut consumer, 1, |_| {});
        producer.push(&[0xaa]).unwrap();

        let (_, data) = consumer.read(1);
        assert_eq!(data, &[0xaa, 0, 0, 0]);
    }

    #[test]
    fn test_oversized_slot_is_rejected() {
        let (producer, mut consumer) = ring(2);

        assert!(matches!(
            producer.push(&[0x11; 8]),
            Err(RunError::SlotOverflow { len: 8, slot_size: 4, .. })
        ));
        assert!(matches!(producer.try_push(&[0x11; 5]), Err(RunError::SlotOverflow { .. })));
        assert_eq!(producer.pending(), 0);
        assert_eq!(producer.stats().written, 0);

        let (count, _) = consumer.read(1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_backing_too_small() {
        let err = memory_ring("status_out", 64, 16, PageBuffer::zeroed(512)).err();
        assert_eq!(
            err,
            Some(StreamError::BackingTooSmall {
                name: "status_out".to_string(),
                needed: 1024,
                actual: 512
            })
        );
    }
}
