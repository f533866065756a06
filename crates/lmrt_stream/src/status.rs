//! Streaming reader for the `status_out` ring.

use lmrt_core::{Accelerator, SlotRing, StatusReport, StreamError};

use crate::config::StreamConfig;
use crate::ring::{open_ring, poll_ring};

/// Tracks the latest progress report from the accelerator.
///
/// Only the most recent report is kept; earlier ones are overwritten.
pub struct StatusReader {
    name: String,
    ring: Option<Box<dyn SlotRing>>,
    slots_per_poll: usize,
    latest: Option<StatusReport>,
    reports_received: u64,
}

impl StatusReader {
    /// Set up the status ring on the accelerator.
    pub fn open<A: Accelerator + ?Sized>(accelerator: &A, config: &StreamConfig) -> Result<Self, StreamError> {
        let ring = open_ring(accelerator, config, StatusReport::SIZE)?;
        log::info!("Opened status stream {}", config.name);
        Ok(Self::with_ring(&config.name, Some(ring), config.slots_per_poll))
    }

    /// Like [`StatusReader::open`], but a missing stream yields a reader that
    /// never reports progress.
    pub fn open_or_idle<A: Accelerator + ?Sized>(accelerator: &A, config: &StreamConfig) -> Self {
        Self::open(accelerator, config).unwrap_or_else(|err| {
            log::warn!("{err}; status polling disabled");
            Self::idle(&config.name)
        })
    }

    pub fn idle(name: &str) -> Self {
        Self::with_ring(name, None, 1)
    }

    pub fn from_ring(name: &str, ring: Box<dyn SlotRing>, slots_per_poll: usize) -> Result<Self, StreamError> {
        if ring.slot_size() != StatusReport::SIZE {
            return Err(StreamError::SlotSizeMismatch {
                name: name.to_string(),
                expected: StatusReport::SIZE,
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
            latest: None,
            reports_received: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_available(&self) -> bool {
        self.ring.is_some()
    }

    /// Take whatever status slots are ready, without blocking.
    ///
    /// Returns true if at least one new report arrived.
    pub fn poll(&mut self) -> bool {
        let Some(ring) = self.ring.as_mut() else {
            return false;
        };

        let latest = &mut self.latest;
        let num_read = poll_ring(&mut **ring, self.slots_per_poll, |bytes| {
            *latest = Some(bytemuck::pod_read_unaligned(bytes));
        });

        if num_read > 0 {
            self.reports_received += num_read as u64;
            if let Some(report) = &self.latest {
                log::debug!(
                    "Status: {} ticks, {} intersections",
                    report.ticks,
                    report.intersections
                );
            }
        }
        num_read > 0
    }

    /// The most recent report, if any has arrived.
    pub fn latest(&self) -> Option<&StatusReport> {
        self.latest.as_ref()
    }

    /// Evaluate `predicate` against the latest report; false before any report.
    pub fn is_complete<F>(&self, predicate: F) -> bool
    where
        F: FnOnce(&StatusReport) -> bool,
    {
        self.latest.as_ref().is_some_and(predicate)
    }

    pub fn reports_received(&self) -> u64 {
        self.reports_received
    }

    /// Log the final intersection count.
    pub fn log_summary(&self) {
        match &self.latest {
            Some(report) => {
                log::info!("Intersection tests complete");
                log::info!("\tTotal intersections: {}", report.intersections);
            }
            None => log::warn!("No status report received from {}", self.name),
        }
    }
}
