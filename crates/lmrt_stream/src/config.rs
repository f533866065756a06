//! Ring stream configuration.

use lmrt_core::{names, ResultSlot, StatusReport};
use serde::{Deserialize, Serialize};

/// Shape of one ring stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Stream name exposed by the accelerator design
    pub name: String,
    /// Ring capacity in slots
    pub num_slots: usize,
    /// Bytes per slot
    pub slot_size: usize,
    /// Slots requested per poll
    pub slots_per_poll: usize,
}

impl StreamConfig {
    /// The `results_out` stream: 512 slots of two intersection pairs each.
    pub fn results() -> Self {
        Self {
            name: names::RESULTS_OUT.to_string(),
            num_slots: 512,
            slot_size: ResultSlot::SIZE,
            slots_per_poll: 1,
        }
    }

    /// The `status_out` stream: 64 slots of one status report each.
    pub fn status() -> Self {
        Self {
            name: names::STATUS_OUT.to_string(),
            num_slots: 64,
            slot_size: StatusReport::SIZE,
            slots_per_poll: 1,
        }
    }

    /// Bytes needed to back the ring.
    pub fn buffer_size(&self) -> usize {
        self.num_slots * self.slot_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_streams() {
        let results = StreamConfig::results();
        assert_eq!(results.name, "results_out");
        assert_eq!(results.buffer_size(), 512 * 16);

        let status = StreamConfig::status();
        assert_eq!(status.name, "status_out");
        assert_eq!(status.buffer_size(), 64 * 16);
        assert_eq!(status.slots_per_poll, 1);
    }
}
