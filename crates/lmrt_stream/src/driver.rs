//! Cooperative poll loop over the result and status rings.
//!
//! The loop itself never sleeps: what happens when a pass finds nothing is
//! decided by the [`Backoff`] it was built with, so tests can run it without
//! any real timing.

use std::time::Duration;

use lmrt_core::StatusReport;
use serde::{Deserialize, Serialize};

use crate::results::ResultReader;
use crate::status::StatusReader;

/// What to do after a poll pass that found no new slots.
pub trait Backoff {
    /// Called once per idle pass.
    fn idle(&mut self);

    /// Called after a pass that made progress.
    fn reset(&mut self) {}
}

impl<F: FnMut()> Backoff for F {
    fn idle(&mut self) {
        self()
    }
}

/// Busy-wait with a CPU spin hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spin;

impl Backoff for Spin {
    fn idle(&mut self) {
        std::hint::spin_loop();
    }
}

/// Sleep a fixed interval on every idle pass.
#[derive(Debug, Clone, Copy)]
pub struct FixedSleep(pub Duration);

impl Backoff for FixedSleep {
    fn idle(&mut self) {
        std::thread::sleep(self.0);
    }
}

/// Sleep for a doubling interval, capped at `max`, reset on progress.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl ExponentialBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            current: min,
        }
    }

    /// Interval the next idle pass will sleep for.
    pub fn current(&self) -> Duration {
        self.current
    }

    fn advance(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }
}

impl Backoff for ExponentialBackoff {
    fn idle(&mut self) {
        std::thread::sleep(self.advance());
    }

    fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Counters from one run of the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    pub passes: u64,
    pub idle_passes: u64,
    pub result_slots: u64,
    pub status_reports: u64,
    /// Whether the completion predicate fired
    pub completed: bool,
}

/// Drives both readers from a single thread until the status says the job is done.
pub struct PollDriver<B: Backoff> {
    backoff: B,
}

impl<B: Backoff> PollDriver<B> {
    pub fn new(backoff: B) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> &B {
        &self.backoff
    }

    /// Poll results and status until `done` holds for the latest status report.
    ///
    /// There is no timeout: a bounded wait belongs in the backoff. If the
    /// status reader has no ring the predicate can never fire, so the loop
    /// returns straight away with `completed == false`.
    pub fn run_until<F>(
        &mut self,
        results: &mut ResultReader,
        status: &mut StatusReader,
        mut done: F,
    ) -> PollSummary
    where
        F: FnMut(&StatusReport) -> bool,
    {
        let mut summary = PollSummary::default();

        if !status.is_available() {
            log::warn!(
                "Status stream {} unavailable, cannot detect completion by polling",
                status.name()
            );
            return summary;
        }

        loop {
            summary.passes += 1;

            let result_slots = results.poll();
            let new_status = status.poll();
            summary.result_slots += result_slots as u64;
            if new_status {
                summary.status_reports += 1;
            }

            if status.is_complete(&mut done) {
                summary.completed = true;
                break;
            }

            if result_slots == 0 && !new_status {
                summary.idle_passes += 1;
                self.backoff.idle();
            } else {
                self.backoff.reset();
            }
        }

        log::info!(
            "Poll loop finished after {} passes ({} idle), {} result slots, {} status reports",
            summary.passes,
            summary.idle_passes,
            summary.result_slots,
            summary.status_reports
        );
        summary
    }
}

impl Default for PollDriver<Spin> {
    fn default() -> Self {
        Self::new(Spin)
    }
}
