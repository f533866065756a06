//! Fixed-layout records exchanged with the accelerator.
//!
//! Every type here is `#[repr(C)]` and `Pod`, so its in-memory
//! representation is exactly what travels over the wire. Padding is spelled
//! out as explicit byte arrays so the sizes match the strides the accelerator
//! declares.

use bytemuck::{Pod, Zeroable};
use lmrt_math::{Ray, Vec3};
use serde::{Deserialize, Serialize};

/// A record with a fixed on-wire layout.
pub trait WireRecord: Pod {
    /// Accelerator constant declaring this record's width in bytes.
    const WIDTH_CONSTANT: &'static str;

    /// Size of one record on the wire.
    const WIRE_SIZE: usize = std::mem::size_of::<Self>();
}

/// Three packed `f32` components.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for Vector3 {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for Vec3 {
    fn from(v: Vector3) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

/// Triangle as stored in accelerator memory: three vertices plus 12 bytes of
/// padding, 48 bytes in total.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct TriangleRecord {
    pub v0: Vector3,
    pub v1: Vector3,
    pub v2: Vector3,
    padding: [u8; 12],
}

impl TriangleRecord {
    pub fn new(v0: impl Into<Vector3>, v1: impl Into<Vector3>, v2: impl Into<Vector3>) -> Self {
        Self {
            v0: v0.into(),
            v1: v1.into(),
            v2: v2.into(),
            padding: [0; 12],
        }
    }

    /// Vertices as glam vectors, in winding order.
    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0.into(), self.v1.into(), self.v2.into()]
    }

    /// The same triangle with `v1` and `v2` swapped.
    pub fn reversed(&self) -> Self {
        Self::new(self.v0, self.v2, self.v1)
    }
}

impl WireRecord for TriangleRecord {
    const WIDTH_CONSTANT: &'static str = "TriangleWidthInBytes";
}

/// Ray as streamed to the accelerator: origin, direction and 8 bytes of
/// padding, 32 bytes in total.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct RayRecord {
    pub origin: Vector3,
    pub direction: Vector3,
    padding: [u8; 8],
}

impl RayRecord {
    pub fn new(origin: impl Into<Vector3>, direction: impl Into<Vector3>) -> Self {
        Self {
            origin: origin.into(),
            direction: direction.into(),
            padding: [0; 8],
        }
    }

    pub fn to_ray(&self) -> Ray {
        Ray::new(self.origin.into(), self.direction.into())
    }
}

impl From<Ray> for RayRecord {
    fn from(ray: Ray) -> Self {
        Self::new(ray.origin, ray.direction)
    }
}

impl WireRecord for RayRecord {
    const WIDTH_CONSTANT: &'static str = "RayWidthInBytes";
}

/// One hit: the ray index and triangle index of an intersecting pair.
///
/// Equality is structural over the two `u32` fields, which is the same as
/// comparing the 8 wire bytes.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Intersection {
    pub ray: u32,
    pub triangle: u32,
}

impl Intersection {
    pub const fn new(ray: u32, triangle: u32) -> Self {
        Self { ray, triangle }
    }
}

/// A 16-byte result slot carrying two intersection pairs.
///
/// There is no "unused" marker: both pairs are always reported as hits.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ResultSlot {
    pub ray_1: u32,
    pub triangle_1: u32,
    pub ray_2: u32,
    pub triangle_2: u32,
}

impl ResultSlot {
    pub const SIZE: usize = std::mem::size_of::<ResultSlot>();

    pub fn from_pairs(first: Intersection, second: Intersection) -> Self {
        Self {
            ray_1: first.ray,
            triangle_1: first.triangle,
            ray_2: second.ray,
            triangle_2: second.triangle,
        }
    }

    pub fn pairs(&self) -> [Intersection; 2] {
        [
            Intersection::new(self.ray_1, self.triangle_1),
            Intersection::new(self.ray_2, self.triangle_2),
        ]
    }
}

/// Snapshot of accelerator progress, one per status slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct StatusReport {
    /// Kernel ticks executed so far
    pub ticks: u32,
    /// Intersections found so far
    pub intersections: u32,
    pub reserved: u64,
}

impl StatusReport {
    pub const SIZE: usize = std::mem::size_of::<StatusReport>();

    pub fn new(ticks: u32, intersections: u32) -> Self {
        Self {
            ticks,
            intersections,
            reserved: 0,
        }
    }
}
