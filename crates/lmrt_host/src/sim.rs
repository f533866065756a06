//! Software stand-in for the intersection accelerator.
//!
//! Behaves like the hardware design from the host's point of view: it
//! declares the same constants, accepts the same action sets, keeps triangles
//! in a byte-addressed memory image and streams results and status back
//! through rings. The kernel runs on its own thread.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use lmrt_core::{
    names, Accelerator, Actions, BurstLayout, Intersection, LayoutError, PageBuffer, RayRecord, ResultSlot, RunError,
    SlotRing, StatusReport, StreamError, TriangleRecord, WireFormat, WireRecord,
};
use lmrt_math::{intersect_triangle, EPSILON};
use lmrt_stream::{memory_ring, RingProducer};

/// Parameters of the simulated design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Memory burst size in bytes
    pub burst_size_bytes: usize,
    /// Width of the `triangles_in` stream in bits
    pub word_width_bits: usize,
    pub triangles_per_tick: u64,
    pub rays_per_tick: u64,
    /// Size of the memory image in bytes
    pub lmem_bytes: usize,
    /// Kernel ticks between progress reports; zero sends only the final report
    pub status_interval_ticks: u64,
    /// Ring streams the design exposes
    pub streams: Vec<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            burst_size_bytes: 384,
            word_width_bits: 1536,
            triangles_per_tick: 1,
            rays_per_tick: 1,
            lmem_bytes: 1 << 20,
            status_interval_ticks: 64,
            streams: vec![names::RESULTS_OUT.to_string(), names::STATUS_OUT.to_string()],
        }
    }
}

struct Lmem {
    bytes: Vec<u8>,
    /// Address of the last memory initialisation, where the kernel reads from
    triangle_base: usize,
}

/// In-process accelerator running the intersection kernel in software.
pub struct SoftwareAccelerator {
    config: SimConfig,
    constants: HashMap<String, u64>,
    lmem: Mutex<Lmem>,
    producers: Mutex<HashMap<String, RingProducer>>,
}

/// A kernel run started with [`Accelerator::run_nonblock`].
pub struct SimJob {
    handle: JoinHandle<Result<KernelStats, RunError>>,
}

/// What the kernel thread did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KernelStats {
    pub tests: u64,
    pub hits: u64,
    pub result_slots: u64,
    pub status_reports: u64,
}

impl SoftwareAccelerator {
    pub fn new(config: SimConfig) -> Self {
        let mut constants = HashMap::new();
        constants.insert(TriangleRecord::WIDTH_CONSTANT.to_string(), TriangleRecord::WIRE_SIZE as u64);
        constants.insert(RayRecord::WIDTH_CONSTANT.to_string(), RayRecord::WIRE_SIZE as u64);
        constants.insert(names::TRIANGLES_IN_WIDTH_IN_BITS.to_string(), config.word_width_bits as u64);
        constants.insert(names::TRIANGLES_PER_TICK.to_string(), config.triangles_per_tick);
        constants.insert(names::RAYS_PER_TICK.to_string(), config.rays_per_tick);

        log::info!(
            "Software accelerator: {} byte bursts, {} bit words, {} bytes of memory",
            config.burst_size_bytes,
            config.word_width_bits,
            config.lmem_bytes
        );

        Self {
            constants,
            lmem: Mutex::new(Lmem {
                bytes: vec![0; config.lmem_bytes],
                triangle_base: 0,
            }),
            producers: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Override or add a named constant.
    pub fn set_constant(&mut self, name: &str, value: u64) {
        self.constants.insert(name.to_string(), value);
    }

    /// Copy of `len` bytes of the memory image starting at `address`.
    pub fn read_lmem(&self, address: usize, len: usize) -> Result<Vec<u8>, RunError> {
        let lmem = self.lock_lmem();
        let range = checked_range(address, len, lmem.bytes.len())?;
        Ok(lmem.bytes[range].to_vec())
    }

    fn lock_lmem(&self) -> MutexGuard<'_, Lmem> {
        self.lmem.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn producer(&self, name: &str) -> Option<RingProducer> {
        self.producers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn memory_initialisation(&self, actions: &mut Actions) -> Result<(), RunError> {
        let address = to_usize(actions.require_param(names::ADDRESS)?)?;
        let size = to_usize(actions.require_param(names::SIZE)?)?;
        let data = actions
            .take_input(names::TRIANGLES_IN)
            .ok_or_else(|| RunError::MissingInput(names::TRIANGLES_IN.to_string()))?;

        let mut lmem = self.lock_lmem();
        let range = checked_range(address, size, lmem.bytes.len())?;
        let len = size.min(data.len());
        let target = &mut lmem.bytes[range];
        target.fill(0);
        target[..len].copy_from_slice(&data[..len]);
        lmem.triangle_base = address;

        log::info!("Wrote {} bytes of triangles at address {}", size, address);
        Ok(())
    }

    fn start_kernel(&self, mut actions: Actions) -> Result<SimJob, RunError> {
        let ticks = actions
            .ticks(names::RAY_TRACER_KERNEL)
            .ok_or_else(|| RunError::MissingParameter(format!("{}.ticks", names::RAY_TRACER_KERNEL)))?;
        let total_triangles = to_usize(actions.require_scalar(names::RAY_TRACER_KERNEL, names::TOTAL_TRIANGLES)?)?;
        let bursts = actions.require_scalar(names::MEMORY_COMMAND_GENERATOR, names::TRIANGLES_TO_READ_IN_BURSTS)?;
        if !actions.is_lmem_ignored(names::TRIANGLES_TO_MEM) {
            log::warn!("{} is not marked ignored; the kernel only reads memory", names::TRIANGLES_TO_MEM);
        }
        let ray_bytes = actions
            .take_input(names::RAYS_IN)
            .ok_or_else(|| RunError::MissingInput(names::RAYS_IN.to_string()))?;

        let format = WireFormat {
            record_width_bytes: TriangleRecord::WIRE_SIZE,
            word_width_bits: self.config.word_width_bits,
            burst_size_bytes: self.config.burst_size_bytes,
            min_bursts: 1,
        };
        let layout = BurstLayout::new(TriangleRecord::WIRE_SIZE, &format, total_triangles)?;
        if layout.total_bursts() as u64 != bursts {
            log::warn!(
                "Memory command generator asked for {} bursts, {} triangles occupy {}",
                bursts,
                total_triangles,
                layout.total_bursts()
            );
        }

        let triangle_bytes = {
            let lmem = self.lock_lmem();
            let range = checked_range(lmem.triangle_base, layout.byte_size(), lmem.bytes.len())?;
            lmem.bytes[range].to_vec()
        };
        let triangles: Vec<TriangleRecord> = (0..total_triangles)
            .filter_map(|i| layout.read_record(&triangle_bytes, i))
            .collect();
        let rays: Vec<RayRecord> = ray_bytes
            .chunks_exact(RayRecord::WIRE_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect();

        let kernel = Kernel {
            triangles,
            rays,
            planned_ticks: ticks,
            status_interval: self.config.status_interval_ticks,
            results: self.producer(names::RESULTS_OUT),
            status: self.producer(names::STATUS_OUT),
        };

        log::info!(
            "Launching kernel: {} rays x {} triangles over {} ticks",
            kernel.rays.len(),
            kernel.triangles.len(),
            ticks
        );
        let handle = thread::Builder::new()
            .name("lmrt-kernel".to_string())
            .spawn(move || kernel.run())
            .map_err(|err| RunError::Launch(err.to_string()))?;
        Ok(SimJob { handle })
    }
}

impl Accelerator for SoftwareAccelerator {
    type Job = SimJob;

    fn constant(&self, name: &str) -> Option<u64> {
        self.constants.get(name).copied()
    }

    fn burst_size(&self) -> usize {
        self.config.burst_size_bytes
    }

    fn has_stream(&self, name: &str) -> bool {
        self.config.streams.iter().any(|s| s == name)
    }

    fn setup_stream(
        &self,
        name: &str,
        num_slots: usize,
        slot_size: usize,
        backing: PageBuffer,
    ) -> Result<Box<dyn SlotRing>, StreamError> {
        if !self.has_stream(name) {
            return Err(StreamError::Unavailable(name.to_string()));
        }
        let (producer, ring) = memory_ring(name, num_slots, slot_size, backing)?;
        self.producers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), producer);
        Ok(Box::new(ring))
    }

    fn run(&self, mut actions: Actions) -> Result<(), RunError> {
        match actions.mode() {
            Some(names::MEMORY_INITIALISATION) => self.memory_initialisation(&mut actions),
            Some(mode) => Err(RunError::UnknownMode(mode.to_string())),
            None => {
                let job = self.start_kernel(actions)?;
                self.wait(job)
            }
        }
    }

    fn run_nonblock(&self, actions: Actions) -> Result<SimJob, RunError> {
        match actions.mode() {
            None => self.start_kernel(actions),
            Some(mode) => Err(RunError::UnknownMode(mode.to_string())),
        }
    }

    fn wait(&self, job: SimJob) -> Result<(), RunError> {
        let stats = job.handle.join().map_err(|_| RunError::JobPanicked)??;
        log::debug!(
            "Kernel finished: {} tests, {} hits, {} result slots, {} status reports",
            stats.tests,
            stats.hits,
            stats.result_slots,
            stats.status_reports
        );
        Ok(())
    }
}

/// Everything the kernel thread owns.
struct Kernel {
    triangles: Vec<TriangleRecord>,
    rays: Vec<RayRecord>,
    planned_ticks: u64,
    status_interval: u64,
    results: Option<RingProducer>,
    status: Option<RingProducer>,
}

impl Kernel {
    fn run(self) -> Result<KernelStats, RunError> {
        let mut stats = KernelStats::default();
        let total_tests = (self.rays.len() as u64) * (self.triangles.len() as u64);
        let mut next_report = self.status_interval;
        let mut pending: Option<Intersection> = None;

        for (r, ray_record) in self.rays.iter().enumerate() {
            let ray = ray_record.to_ray();
            for (t, triangle) in self.triangles.iter().enumerate() {
                let [v0, v1, v2] = triangle.vertices();
                stats.tests += 1;

                if intersect_triangle(&ray, v0, v1, v2, EPSILON).is_some() {
                    stats.hits += 1;
                    let hit = Intersection::new(r as u32, t as u32);
                    match pending.take() {
                        Some(first) => self.emit_results(&mut stats, first, hit)?,
                        None => pending = Some(hit),
                    }
                }

                // Progress reports stop short of the planned tick count so only
                // the final report can mark the run complete.
                let tick = scale_ticks(stats.tests, total_tests, self.planned_ticks);
                if self.status_interval > 0 && tick >= next_report && tick < self.planned_ticks {
                    if let Some(status) = &self.status {
                        if status.try_push(bytemuck::bytes_of(&report(tick, stats.hits)))? {
                            stats.status_reports += 1;
                        }
                    }
                    next_report = (tick / self.status_interval + 1) * self.status_interval;
                }
            }
        }

        // An odd hit count leaves half a slot; the other half goes out as zeros
        if let Some(last) = pending {
            self.emit_results(&mut stats, last, Intersection::default())?;
        }

        if let Some(status) = &self.status {
            status.push_record(&report(self.planned_ticks, stats.hits))?;
            stats.status_reports += 1;
        }
        Ok(stats)
    }

    fn emit_results(&self, stats: &mut KernelStats, first: Intersection, second: Intersection) -> Result<(), RunError> {
        if let Some(results) = &self.results {
            results.push_record(&ResultSlot::from_pairs(first, second))?;
            stats.result_slots += 1;
        }
        Ok(())
    }
}

fn report(ticks: u64, hits: u64) -> StatusReport {
    StatusReport::new(
        u32::try_from(ticks).unwrap_or(u32::MAX),
        u32::try_from(hits).unwrap_or(u32::MAX),
    )
}

/// Kernel tick reached after `done` of `total` tests.
fn scale_ticks(done: u64, total: u64, planned: u64) -> u64 {
    if total == 0 {
        return planned;
    }
    ((done as u128 * planned as u128) / total as u128) as u64
}

fn checked_range(address: usize, len: usize, capacity: usize) -> Result<std::ops::Range<usize>, RunError> {
    match address.checked_add(len) {
        Some(end) if end <= capacity => Ok(address..end),
        _ => Err(RunError::OutOfBounds {
            address,
            size: len,
            capacity,
        }),
    }
}

fn to_usize(value: u64) -> Result<usize, RunError> {
    usize::try_from(value).map_err(|_| RunError::Layout(LayoutError::Overflow))
}
