//! Host-side readers for the accelerator's outbound ring streams.
//!
//! Every read from a ring is paired with a discard of exactly the slots that
//! were read, so a slot is decoded once and then handed back to the producer.

pub mod config;
pub mod driver;
pub mod results;
pub mod ring;
pub mod status;

#[cfg(test)]
mod testing;

pub use config::StreamConfig;
pub use driver::{Backoff, ExponentialBackoff, FixedSleep, PollDriver, PollSummary, Spin};
pub use results::ResultReader;
pub use ring::{memory_ring, open_ring, poll_ring, MemoryRing, RingProducer, RingStats};
pub use status::StatusReader;
