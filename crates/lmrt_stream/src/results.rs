//! Streaming reader for the `results_out` ring.

use lmrt_core::{Accelerator, Intersection, ResultSlot, SlotRing, StreamError};

use crate::config::StreamConfig;
use crate::ring::{open_ring, poll_ring};

/// Accumulates intersections as the accelerator streams them back.
///
/// Results are kept in arrival order, which need not match the order the
/// accelerator tested pairs in. The collection only ever grows.
pub struct ResultReader {
    name: String,
    ring: Option<Box<dyn SlotRing>>,
    slots_per_poll: usize,
    intersections: Vec<Intersection>,
    slots_read: u64,
}

impl ResultReader {
    /// Set up the results ring on the accelerator.
    pub fn open<A: Accelerator + ?Sized>(accelerator: &A, config: &StreamConfig) -> Result<Self, StreamError> {
        let ring = open_ring(accelerator, config, ResultSlot::SIZE)?;
        log::info!(
            "Opened result stream {} ({} slots x {} bytes)",
            config.name,
            config.num_slots,
            config.slot_size
        );
        Ok(Self::with_ring(&config.name, Some(ring), config.slots_per_poll))
    }

    /// Like [`ResultReader::open`], but a missing stream yields a reader whose
    /// polls never return anything.
    pub fn open_or_idle<A: Accelerator + ?Sized>(accelerator: &A, config: &StreamConfig) -> Self {
        Self::open(accelerator, config).unwrap_or_else(|err| {
            log::warn!("{err}; result polling disabled");
            Self::idle(&config.name)
        })
    }

    /// A reader with no ring attached.
    pub fn idle(name: &str) -> Self {
        Self::with_ring(name, None, 1)
    }

    /// Wrap an existing ring.
    pub fn from_ring(name: &str, ring: Box<dyn SlotRing>, slots_per_poll: usize) -> Result<Self, StreamError> {
        if ring.slot_size() != ResultSlot::SIZE {
            return Err(StreamError::SlotSizeMismatch {
                name: name.to_string(),
                expected: ResultSlot::SIZE,
                actual: ring.slot_size(),
            });
        }
        Ok(Self::with_ring(name, Some(ring), slots_per_poll))
    }

    fn with_ring(name: &str, ring: Option<Box<dyn SlotRing>>, slots_per_poll: usize) -> Self {
        Self {
            name: name.to_string(),
            ring,
            slots_per_poll: slots_per_poll.max(1),
            intersections: Vec::new(),
            slots_read: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a ring is attached.
    pub fn is_available(&self) -> bool {
        self.ring.is_some()
    }

    /// Take whatever result slots are ready, without blocking.
    ///
    /// Both pairs of every slot are recorded as hits. Returns the number of
    /// slots consumed.
    pub fn poll(&mut self) -> usize {
        let Some(ring) = self.ring.as_mut() else {
            return 0;
        };

        let intersections = &mut self.intersections;
        let num_read = poll_ring(&mut **ring, self.slots_per_poll, |bytes| {
            let slot: ResultSlot = bytemuck::pod_read_unaligned(bytes);
            intersections.extend_from_slice(&slot.pairs());
        });

        self.slots_read += num_read as u64;
        num_read
    }

    /// Poll until a poll comes back empty. Returns the slots consumed.
    pub fn drain(&mut self) -> usize {
        let mut total = 0;
        loop {
            let n = self.poll();
            if n == 0 {
                break;
            }
            total += n;
        }
        if total > 0 {
            log::debug!("Drained {} result slots from {}", total, self.name);
        }
        total
    }

    /// Every intersection received so far, in arrival order.
    pub fn intersections(&self) -> &[Intersection] {
        &self.intersections
    }

    pub fn into_intersections(self) -> Vec<Intersection> {
        self.intersections
    }

    pub fn slots_read(&self) -> u64 {
        self.slots_read
    }

    /// Log every received pair at debug level.
    pub fn log_results(&self) {
        for hit in &self.intersections {
            log::debug!("Ray: {} Triangle: {}", hit.ray, hit.triangle);
        }
    }
}
