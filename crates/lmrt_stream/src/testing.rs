//! Minimal accelerator exposing only ring streams, for reader tests.

use std::cell::RefCell;
use std::collections::HashMap;

use lmrt_core::{Accelerator, Actions, PageBuffer, RunError, SlotRing, StreamError};

use crate::ring::{memory_ring, RingProducer};

pub struct StreamHost {
    streams: Vec<String>,
    producers: RefCell<HashMap<String, RingProducer>>,
}

impl StreamHost {
    pub fn without_streams() -> Self {
        Self::with_streams(&[])
    }

    pub fn with_streams(streams: &[&str]) -> Self {
        Self {
            streams: streams.iter().map(|s| s.to_string()).collect(),
            producers: RefCell::new(HashMap::new()),
        }
    }

    pub fn producer(&self, name: &str) -> Option<RingProducer> {
        self.producers.borrow().get(name).cloned()
    }
}

impl Accelerator for StreamHost {
    type Job = ();

    fn constant(&self, _name: &str) -> Option<u64> {
        None
    }

    fn burst_size(&self) -> usize {
        384
    }

    fn has_stream(&self, name: &str) -> bool {
        self.streams.iter().any(|s| s == name)
    }

    fn setup_stream(
        &self,
        name: &str,
        num_slots: usize,
        slot_size: usize,
        backing: PageBuffer,
    ) -> Result<Box<dyn SlotRing>, StreamError> {
        let (producer, ring) = memory_ring(name, num_slots, slot_size, backing)?;
        self.producers.borrow_mut().insert(name.to_string(), producer);
        Ok(Box::new(ring))
    }

    fn run(&self, _actions: Actions) -> Result<(), RunError> {
        Ok(())
    }

    fn run_nonblock(&self, _actions: Actions) -> Result<(), RunError> {
        Ok(())
    }

    fn wait(&self, _job: ()) -> Result<(), RunError> {
        Ok(())
    }
}
