//! The accelerator as seen from the host: named constants, action sets and
//! ring-buffer streams.
//!
//! Nothing here knows how the accelerator is loaded or executed. A hardware
//! binding or a software stand-in implements [`Accelerator`] and is passed by
//! reference to whatever needs it.

use std::collections::{BTreeMap, BTreeSet};

use crate::buffer::PageBuffer;
use crate::error::{RunError, StreamError};

/// Names of the constants, kernels and streams the ray tracer design exposes.
pub mod names {
    pub const TRIANGLES_IN_WIDTH_IN_BITS: &str = "TrianglesInWidthInBits";
    pub const TRIANGLES_PER_TICK: &str = "TrianglesPerTick";
    pub const RAYS_PER_TICK: &str = "RaysPerTick";

    pub const MEMORY_INITIALISATION: &str = "memoryInitialisation";
    pub const RAY_TRACER_KERNEL: &str = "RayTracerKernel";
    pub const MEMORY_COMMAND_GENERATOR: &str = "MemoryCommandGenerator";

    pub const TRIANGLES_IN: &str = "triangles_in";
    pub const TRIANGLES_TO_MEM: &str = "triangles_to_mem";
    pub const RAYS_IN: &str = "rays_in";
    pub const RESULTS_OUT: &str = "results_out";
    pub const STATUS_OUT: &str = "status_out";

    pub const ADDRESS: &str = "address";
    pub const SIZE: &str = "size";
    pub const TRIANGLES_TO_READ_IN_BURSTS: &str = "triangles_to_read_in_bursts";
    pub const TOTAL_TRIANGLES: &str = "total_triangles";
}

/// Consumer side of a ring of fixed-size slots filled by the accelerator.
pub trait SlotRing: Send {
    /// Capacity of the ring in slots.
    fn num_slots(&self) -> usize;

    /// Size of one slot in bytes.
    fn slot_size(&self) -> usize;

    /// Take up to `max_slots` ready slots without blocking.
    ///
    /// Returns the number of slots taken and their bytes, back to back. Slots
    /// handed out here are not offered again; they stay owned by the caller
    /// until released with [`SlotRing::discard`].
    fn read(&mut self, max_slots: usize) -> (usize, &[u8]);

    /// Release the `count` oldest slots taken by [`SlotRing::read`].
    fn discard(&mut self, count: usize);
}

/// An external accelerator that runs action sets and exposes ring streams.
pub trait Accelerator {
    /// Handle for a job started with [`Accelerator::run_nonblock`].
    type Job;

    /// Look up a named constant baked into the accelerator design.
    fn constant(&self, name: &str) -> Option<u64>;

    /// Size of one memory burst in bytes.
    fn burst_size(&self) -> usize;

    /// Whether the design exposes a ring stream called `name`.
    fn has_stream(&self, name: &str) -> bool;

    /// Attach `backing` as the ring for stream `name`.
    fn setup_stream(
        &self,
        name: &str,
        num_slots: usize,
        slot_size: usize,
        backing: PageBuffer,
    ) -> Result<Box<dyn SlotRing>, StreamError>;

    /// Run an action set to completion.
    fn run(&self, actions: Actions) -> Result<(), RunError>;

    /// Start an action set and return immediately.
    fn run_nonblock(&self, actions: Actions) -> Result<Self::Job, RunError>;

    /// Block until a job started with [`Accelerator::run_nonblock`] finishes.
    fn wait(&self, job: Self::Job) -> Result<(), RunError>;
}

/// Named scalar parameters and stream bindings for one accelerator run.
#[derive(Debug, Clone, Default)]
pub struct Actions {
    mode: Option<String>,
    params: BTreeMap<String, u64>,
    ticks: BTreeMap<String, u64>,
    scalars: BTreeMap<(String, String), u64>,
    inputs: BTreeMap<String, Vec<u8>>,
    ignored_lmem: BTreeSet<String>,
}

impl Actions {
    /// Actions for the design's default mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions for a named engine mode (e.g. memory initialisation).
    pub fn for_mode(mode: impl Into<String>) -> Self {
        Self {
            mode: Some(mode.into()),
            ..Self::default()
        }
    }

    /// Set a mode-level scalar parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: u64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Set how many ticks a kernel runs for.
    pub fn with_ticks(mut self, kernel: impl Into<String>, ticks: u64) -> Self {
        self.ticks.insert(kernel.into(), ticks);
        self
    }

    /// Set a kernel scalar input.
    pub fn with_scalar(mut self, kernel: impl Into<String>, name: impl Into<String>, value: u64) -> Self {
        self.scalars.insert((kernel.into(), name.into()), value);
        self
    }

    /// Bind bytes to an input stream.
    pub fn with_input(mut self, stream: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.inputs.insert(stream.into(), bytes);
        self
    }

    /// Leave an LMem stream unconnected for this run.
    pub fn with_ignored_lmem(mut self, stream: impl Into<String>) -> Self {
        self.ignored_lmem.insert(stream.into());
        self
    }

    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    pub fn param(&self, name: &str) -> Option<u64> {
        self.params.get(name).copied()
    }

    pub fn ticks(&self, kernel: &str) -> Option<u64> {
        self.ticks.get(kernel).copied()
    }

    pub fn scalar(&self, kernel: &str, name: &str) -> Option<u64> {
        self.scalars
            .get(&(kernel.to_string(), name.to_string()))
            .copied()
    }

    pub fn input(&self, stream: &str) -> Option<&[u8]> {
        self.inputs.get(stream).map(Vec::as_slice)
    }

    /// Move the bytes bound to `stream` out of the action set.
    pub fn take_input(&mut self, stream: &str) -> Option<Vec<u8>> {
        self.inputs.remove(stream)
    }

    pub fn is_lmem_ignored(&self, stream: &str) -> bool {
        self.ignored_lmem.contains(stream)
    }

    /// Fetch a required mode-level parameter.
    pub fn require_param(&self, name: &str) -> Result<u64, RunError> {
        self.param(name)
            .ok_or_else(|| RunError::MissingParameter(name.to_string()))
    }

    /// Fetch a required kernel scalar.
    pub fn require_scalar(&self, kernel: &str, name: &str) -> Result<u64, RunError> {
        self.scalar(kernel, name)
            .ok_or_else(|| RunError::MissingParameter(format!("{kernel}.{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_builder() {
        let actions = Actions::new()
            .with_ticks(names::RAY_TRACER_KERNEL, 256)
            .with_scalar(names::RAY_TRACER_KERNEL, names::TOTAL_TRIANGLES, 16)
            .with_input(names::RAYS_IN, vec![1, 2, 3])
            .with_ignored_lmem(names::TRIANGLES_TO_MEM);

        assert_eq!(actions.mode(), None);
        assert_eq!(actions.ticks(names::RAY_TRACER_KERNEL), Some(256));
        assert_eq!(
            actions.scalar(names::RAY_TRACER_KERNEL, names::TOTAL_TRIANGLES),
            Some(16)
        );
        assert_eq!(actions.input(names::RAYS_IN), Some(&[1u8, 2, 3][..]));
        assert!(actions.is_lmem_ignored(names::TRIANGLES_TO_MEM));
        assert!(!actions.is_lmem_ignored(names::TRIANGLES_IN));
    }

    #[test]
    fn test_actions_mode_params() {
        let mut actions = Actions::for_mode(names::MEMORY_INITIALISATION)
            .with_param(names::ADDRESS, 0)
            .with_param(names::SIZE, 768)
            .with_input(names::TRIANGLES_IN, vec![0; 768]);

        assert_eq!(actions.mode(), Some(names::MEMORY_INITIALISATION));
        assert_eq!(actions.require_param(names::SIZE).unwrap(), 768);
        assert!(matches!(
            actions.require_param("missing"),
            Err(RunError::MissingParameter(name)) if name == "missing"
        ));

        assert_eq!(actions.take_input(names::TRIANGLES_IN).map(|b| b.len()), Some(768));
        assert!(actions.input(names::TRIANGLES_IN).is_none());
    }
}
