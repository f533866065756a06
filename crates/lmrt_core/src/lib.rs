//! LMRT Core - wire records and burst packing for the ray tracer accelerator.
//!
//! This crate provides:
//!
//! - **Wire records**: `TriangleRecord`, `RayRecord`, `ResultSlot`, `StatusReport`
//! - **Packing**: `BurstLayout` and `PackedRecordBuffer` for burst-aligned transfers
//! - **Collaborator traits**: `Accelerator` and `SlotRing`, plus `Actions`
//! - **Planning**: `KernelPlan` tick counts and action sets
//!
//! # Example
//!
//! ```ignore
//! use lmrt_core::{PackedRecordBuffer, TriangleRecord, WireFormat};
//!
//! let format = WireFormat::query::<_, TriangleRecord>(&accelerator)?;
//! let packed = PackedRecordBuffer::from_records(&format, &triangles)?;
//! accelerator.run(lmrt_core::memory_initialisation(&packed, 0)?)?;
//! ```

pub mod accelerator;
pub mod buffer;
pub mod error;
pub mod layout;
pub mod plan;
pub mod records;

// Re-export commonly used types
pub use accelerator::{names, Accelerator, Actions, SlotRing};
pub use buffer::{PageBuffer, PAGE_SIZE};
pub use error::{LayoutError, LayoutResult, RunError, StreamError};
pub use layout::{BurstLayout, PackedRecordBuffer, WireFormat};
pub use plan::{memory_initialisation, KernelPlan};
pub use records::{Intersection, RayRecord, ResultSlot, StatusReport, TriangleRecord, Vector3, WireRecord};
