//! Blocks and views: the ownership-transfer layer of the mediabuf memory
//! model.
//!
//! A [`BlockAllocator`] turns an allocation request into an exclusively
//! owned, writable [`LinearBlock`] or [`GraphicBlock`]. Producers map a
//! block into a write view, fill it, and `share()` it: sharing freezes a
//! sub-range (or crop) into an immutable, cheaply cloneable
//! [`ConstLinearBlock`] / [`ConstGraphicBlock`] guarded by a fence, without
//! copying memory: the mutable block and every const block co-own the
//! backing allocation, which is released when the last of them drops.
//!
//! Mapping is deferred through [`Acquirable`]: acquiring waits on the
//! fence, performs the actual mapping, and yields a bounds-checked view.
//! Views unmap when dropped; sub-slicing a view is pure address
//! arithmetic and never re-maps.

pub mod block;
pub mod view;

pub use block::{BlockAllocator, ConstGraphicBlock, ConstLinearBlock, GraphicBlock, LinearBlock};
pub use view::{Acquirable, ConstGraphicView, GraphicView, ReadView, WriteView};
