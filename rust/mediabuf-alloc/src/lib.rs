//! The raw allocation layer of the mediabuf memory model.
//!
//! A [`RawAllocator`] obtains backing memory from an external provider and
//! wraps it in an owned allocation: a flat byte range
//! ([`LinearAllocation`]) or a two-dimensional, multi-plane pixel store
//! ([`GraphicAllocation`]). Allocations support mapping into a
//! process-local address, with the intended access validated against the
//! usage granted at allocation time. At most one mapping may be open on an
//! allocation at a time.
//!
//! [`SystemAllocator`] is the default in-process provider, backed by OS
//! page memory. Platform providers (ion/gralloc-style backends) plug in by
//! implementing [`RawAllocator`] and [`RawMemory`].

pub mod allocation;
pub mod geometry;
pub mod system;
pub mod usage;

pub use allocation::{
    AllocationHandle, GraphicAllocation, LinearAllocation, MemoryRegion, PlanePtrs, RawAllocator,
    RawMemory,
};
pub use geometry::{PLANE_COUNT, PixelFormat, PlaneIndex, PlaneInfo, PlaneLayout, Rect};
pub use system::SystemAllocator;
pub use usage::MemoryUsage;
