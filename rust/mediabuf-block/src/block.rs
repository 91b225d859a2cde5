//! Mutable blocks, shared const blocks, and the block allocator policy
//! layer.

use std::sync::Arc;

use mediabuf_alloc::{
    AllocationHandle, GraphicAllocation, LinearAllocation, MemoryUsage, PixelFormat, RawAllocator,
    Rect,
};
use mediabuf_common::fence::{self, SharedFence};
use mediabuf_common::{Result, verify_arg};

use crate::view::{
    Acquirable, ConstGraphicView, GraphicMapping, GraphicView, LinearMapping, ReadView, WriteView,
};

/// Turns allocation requests into freshly owned, writable blocks.
///
/// A thin policy layer over a [`RawAllocator`]: provider errors
/// (insufficient memory, invalid dimensions, unsatisfiable usage) pass
/// through unchanged.
#[derive(Clone)]
pub struct BlockAllocator {
    allocator: Arc<dyn RawAllocator>,
}

impl BlockAllocator {
    pub fn new(allocator: Arc<dyn RawAllocator>) -> BlockAllocator {
        BlockAllocator { allocator }
    }

    /// Allocates a writable linear block of the given capacity, with no
    /// prior range restriction.
    pub fn allocate_linear_block(
        &self,
        capacity: usize,
        usage: MemoryUsage,
    ) -> Result<LinearBlock> {
        let alloc = self.allocator.allocate_linear(capacity, usage)?;
        Ok(LinearBlock {
            alloc: Arc::new(alloc),
        })
    }

    /// Allocates a writable graphic block of the given dimensions, with no
    /// prior crop restriction.
    pub fn allocate_graphic_block(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicBlock> {
        let alloc = self
            .allocator
            .allocate_graphic(width, height, format, usage)?;
        Ok(GraphicBlock {
            alloc: Arc::new(alloc),
        })
    }
}

/// An exclusively owned, writable linear memory block.
///
/// Writing goes through [`map`](LinearBlock::map); freezing a sub-range
/// for consumers goes through [`share`](LinearBlock::share). The caller
/// must drop the write view before sharing the range it covers: the
/// model exposes the fence for ordering but does not police write/share
/// interleaving itself.
pub struct LinearBlock {
    alloc: Arc<LinearAllocation>,
}

impl LinearBlock {
    /// Returns the capacity of the block in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.alloc.capacity()
    }

    /// Returns the identity of the backing allocation.
    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.alloc.handle()
    }

    /// Returns a deferred write mapping over the whole block.
    ///
    /// Acquiring performs the actual mapping and yields a [`WriteView`]
    /// with `offset() == 0` and `size() == capacity()`. The allocation
    /// must grant software read and write. Acquiring while another
    /// mapping is open fails with `Refused`.
    pub fn map(&self) -> Acquirable<WriteView> {
        let alloc = self.alloc.clone();
        Acquirable::new(fence::ready(), move || {
            let size = alloc.capacity();
            let mapping =
                LinearMapping::open(alloc, 0, size, MemoryUsage::software_read_write(), None)?;
            Ok(WriteView::over(mapping))
        })
    }

    /// Freezes `[offset, offset + size)` into an immutable, shareable
    /// block guarded by `fence`.
    ///
    /// No memory is copied and the block remains usable; the const block
    /// co-owns the backing allocation. A reader must wait on `fence`
    /// before trusting the shared content.
    ///
    /// # Errors
    ///
    /// `BadValue` if the range exceeds the block capacity.
    pub fn share(&self, offset: usize, size: usize, fence: SharedFence) -> Result<ConstLinearBlock> {
        verify_arg!(offset, offset.checked_add(size).is_some());
        verify_arg!(offset, offset + size <= self.alloc.capacity());
        verify_arg!(size, size > 0);
        Ok(ConstLinearBlock {
            alloc: self.alloc.clone(),
            offset,
            size,
            fence,
        })
    }
}

impl std::fmt::Debug for LinearBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearBlock")
            .field("handle", &self.handle())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// An immutable, reference-counted, range-bounded slice of a linear
/// allocation.
///
/// Clones alias the same range; the backing memory is released when the
/// originating block and every const block over it have dropped.
#[derive(Clone)]
pub struct ConstLinearBlock {
    alloc: Arc<LinearAllocation>,
    offset: usize,
    size: usize,
    fence: SharedFence,
}

impl ConstLinearBlock {
    /// Returns the offset of the shared range within the allocation.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the size of the shared range in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the fence a reader must wait on before trusting the
    /// content.
    #[inline]
    pub fn fence(&self) -> &SharedFence {
        &self.fence
    }

    /// Returns the identity of the backing allocation.
    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.alloc.handle()
    }

    /// Returns a deferred read mapping bounded exactly to the shared
    /// range.
    ///
    /// Acquiring waits on the block's fence, maps the range, and yields a
    /// [`ReadView`] whose capacity equals the shared size, not the
    /// original block capacity.
    pub fn map(&self) -> Acquirable<ReadView> {
        let alloc = self.alloc.clone();
        let (offset, size) = (self.offset, self.size);
        Acquirable::new(self.fence.clone(), move || {
            let mapping =
                LinearMapping::open(alloc, offset, size, MemoryUsage::SOFTWARE_READ, None)?;
            Ok(ReadView::over(mapping))
        })
    }
}

impl std::fmt::Debug for ConstLinearBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstLinearBlock")
            .field("handle", &self.handle())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

/// An exclusively owned, writable graphic (2D, multi-plane) block.
pub struct GraphicBlock {
    alloc: Arc<GraphicAllocation>,
}

impl GraphicBlock {
    /// Returns the width of the block in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.alloc.width()
    }

    /// Returns the height of the block in samples.
    #[inline]
    pub fn height(&self) -> u32 {
        self.alloc.height()
    }

    /// Returns the pixel format of the block.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.alloc.format()
    }

    /// Returns the identity of the backing allocation.
    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.alloc.handle()
    }

    /// Returns a deferred write mapping over the full surface.
    pub fn map(&self) -> Acquirable<GraphicView> {
        let alloc = self.alloc.clone();
        Acquirable::new(fence::ready(), move || {
            let rect = Rect::new(alloc.width(), alloc.height());
            let mapping =
                GraphicMapping::open(alloc, rect, MemoryUsage::software_read_write(), None)?;
            Ok(GraphicView::over(mapping))
        })
    }

    /// Freezes the given crop into an immutable, shareable graphic block
    /// guarded by `fence`.
    ///
    /// # Errors
    ///
    /// `BadValue` if the crop is empty or exceeds the block dimensions.
    pub fn share(&self, crop: Rect, fence: SharedFence) -> Result<ConstGraphicBlock> {
        verify_arg!(crop, crop.width > 0 && crop.height > 0);
        verify_arg!(crop, crop.fits_within(self.alloc.width(), self.alloc.height()));
        Ok(ConstGraphicBlock {
            alloc: self.alloc.clone(),
            crop,
            fence,
        })
    }
}

impl std::fmt::Debug for GraphicBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicBlock")
            .field("handle", &self.handle())
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// An immutable, reference-counted, crop-bounded slice of a graphic
/// allocation.
#[derive(Clone)]
pub struct ConstGraphicBlock {
    alloc: Arc<GraphicAllocation>,
    crop: Rect,
    fence: SharedFence,
}

impl ConstGraphicBlock {
    /// Returns the shared crop rect.
    #[inline]
    pub fn crop(&self) -> Rect {
        self.crop
    }

    /// Returns the fence a reader must wait on before trusting the
    /// content.
    #[inline]
    pub fn fence(&self) -> &SharedFence {
        &self.fence
    }

    /// Returns the identity of the backing allocation.
    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.alloc.handle()
    }

    /// Returns a deferred read mapping bounded to the shared crop.
    pub fn map(&self) -> Acquirable<ConstGraphicView> {
        let alloc = self.alloc.clone();
        let crop = self.crop;
        Acquirable::new(self.fence.clone(), move || {
            let mapping = GraphicMapping::open(alloc, crop, MemoryUsage::SOFTWARE_READ, None)?;
            Ok(ConstGraphicView::over(mapping))
        })
    }
}

impl std::fmt::Debug for ConstGraphicBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstGraphicBlock")
            .field("handle", &self.handle())
            .field("crop", &self.crop)
            .finish()
    }
}
