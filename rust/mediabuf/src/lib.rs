//! Block-oriented buffer memory model for media pipelines.
//!
//! The core chain: a [`BlockAllocator`] allocates writable blocks from a
//! [`RawAllocator`]; producers map a block into a write view, fill it, and
//! `share()` it into an immutable fence-guarded const block; consumers map
//! const blocks into bounded read views without copying; one or more const
//! blocks of a single kind aggregate into a [`Buffer`] carrying typed
//! metadata and destroy notification.
//!
//! This crate is the facade: it hosts the buffer aggregate and re-exports
//! the allocation and block layers.

pub mod buffer;
pub mod data;
pub mod info;

pub use buffer::{Buffer, BufferId, OnDestroyNotify};
pub use data::{BufferData, BufferKind};
pub use info::{BufferInfo, downcast_info};

pub use mediabuf_alloc::{
    AllocationHandle, GraphicAllocation, LinearAllocation, MemoryRegion, MemoryUsage, PixelFormat,
    PlaneIndex, PlaneInfo, PlaneLayout, RawAllocator, RawMemory, Rect, SystemAllocator,
};
pub use mediabuf_block::{
    Acquirable, BlockAllocator, ConstGraphicBlock, ConstGraphicView, ConstLinearBlock,
    GraphicBlock, GraphicView, LinearBlock, ReadView, WriteView,
};
pub use mediabuf_common::error::{Error, ErrorKind};
pub use mediabuf_common::fence::{self, Fence, SharedFence};
pub use mediabuf_common::Result;
