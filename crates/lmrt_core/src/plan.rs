//! Kernel run planning: tick counts and the action sets for one ray batch.

use serde::{Deserialize, Serialize};

use crate::accelerator::{names, Accelerator, Actions};
use crate::error::{LayoutError, LayoutResult};
use crate::layout::{BurstLayout, PackedRecordBuffer};
use crate::records::{RayRecord, StatusReport, TriangleRecord, WireRecord};

/// How long each kernel runs to test every ray against every packed triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelPlan {
    /// Triangles the kernel iterates over, padding included
    pub total_triangles: u64,
    /// Bursts the memory command generator requests per ray
    pub triangle_bursts: u64,
    pub rays: u64,
    pub triangles_per_tick: u64,
    pub rays_per_tick: u64,
    pub intersection_ticks: u64,
    pub memory_command_ticks: u64,
}

impl KernelPlan {
    pub fn new(
        layout: &BurstLayout,
        ray_count: usize,
        triangles_per_tick: u64,
        rays_per_tick: u64,
    ) -> LayoutResult<Self> {
        if triangles_per_tick == 0 {
            return Err(LayoutError::Zero("triangles per tick"));
        }
        if rays_per_tick == 0 {
            return Err(LayoutError::Zero("rays per tick"));
        }

        let total_triangles = layout.total_records() as u64;
        let rays = ray_count as u64;
        let ray_ticks = rays / rays_per_tick;

        let intersection_ticks = (total_triangles / triangles_per_tick)
            .checked_mul(ray_ticks)
            .ok_or(LayoutError::Overflow)?;
        // Status reports carry ticks as u32, so a longer run could never report done
        if intersection_ticks > u64::from(u32::MAX) {
            return Err(LayoutError::Overflow);
        }

        Ok(Self {
            total_triangles,
            triangle_bursts: layout.total_bursts() as u64,
            rays,
            triangles_per_tick,
            rays_per_tick,
            intersection_ticks,
            memory_command_ticks: ray_ticks,
        })
    }

    /// Plan a run using the accelerator's declared tick divisors.
    ///
    /// Divisors the design does not declare default to one. If the design
    /// declares a ray width it must match the host's ray record.
    pub fn query<A: Accelerator + ?Sized>(
        accelerator: &A,
        layout: &BurstLayout,
        ray_count: usize,
    ) -> LayoutResult<Self> {
        if let Some(declared) = accelerator.constant(RayRecord::WIDTH_CONSTANT) {
            if declared != RayRecord::WIRE_SIZE as u64 {
                return Err(LayoutError::RecordWidthMismatch {
                    host: RayRecord::WIRE_SIZE,
                    declared: usize::try_from(declared).map_err(|_| LayoutError::Overflow)?,
                });
            }
        }

        let triangles_per_tick = accelerator.constant(names::TRIANGLES_PER_TICK).unwrap_or(1);
        let rays_per_tick = accelerator.constant(names::RAYS_PER_TICK).unwrap_or(1);
        Self::new(layout, ray_count, triangles_per_tick, rays_per_tick)
    }

    /// Action set for the intersection run over `rays`.
    pub fn actions(&self, rays: &[RayRecord]) -> Actions {
        Actions::new()
            .with_ticks(names::MEMORY_COMMAND_GENERATOR, self.memory_command_ticks)
            .with_scalar(
                names::MEMORY_COMMAND_GENERATOR,
                names::TRIANGLES_TO_READ_IN_BURSTS,
                self.triangle_bursts,
            )
            .with_ignored_lmem(names::TRIANGLES_TO_MEM)
            .with_ticks(names::RAY_TRACER_KERNEL, self.intersection_ticks)
            .with_scalar(names::RAY_TRACER_KERNEL, names::TOTAL_TRIANGLES, self.total_triangles)
            .with_input(names::RAYS_IN, bytemuck::cast_slice(rays).to_vec())
    }

    /// Whether `report` shows the intersection kernel has run all its ticks.
    pub fn is_complete(&self, report: &StatusReport) -> bool {
        u64::from(report.ticks) >= self.intersection_ticks
    }
}

/// Action set that writes packed triangles into accelerator memory,
/// starting `offset_in_bursts` bursts in.
pub fn memory_initialisation(
    triangles: &PackedRecordBuffer<TriangleRecord>,
    offset_in_bursts: usize,
) -> LayoutResult<Actions> {
    let layout = triangles.layout();
    let address = offset_in_bursts
        .checked_mul(layout.burst_size_bytes())
        .ok_or(LayoutError::Overflow)?;

    Ok(Actions::for_mode(names::MEMORY_INITIALISATION)
        .with_param(names::ADDRESS, address as u64)
        .with_param(names::SIZE, layout.byte_size() as u64)
        .with_input(names::TRIANGLES_IN, triangles.as_bytes().to_vec()))
}
