//! Bounds-checked accessors over mapped block memory.
//!
//! A view borrows its address range from an open mapping on the backing
//! allocation and retires that mapping when the last view over it drops.
//! Sub-viewing narrows the logical window by address arithmetic alone.

use std::fmt;
use std::sync::Arc;

use mediabuf_alloc::{
    GraphicAllocation, LinearAllocation, MemoryUsage, PlaneIndex, PlaneLayout, PlanePtrs, Rect,
};
use mediabuf_common::fence::{Fence, SharedFence};
use mediabuf_common::{Result, verify_arg};

/// A deferred-acquisition handle to a view.
///
/// Acquisition waits on the fence guarding the underlying content, then
/// performs the actual memory mapping. The fence is exposed beforehand so
/// a caller may poll [`Fence::is_ready`] instead of blocking.
pub struct Acquirable<T> {
    fence: SharedFence,
    acquire: Box<dyn FnOnce() -> Result<T> + Send>,
}

impl<T> Acquirable<T> {
    pub(crate) fn new(
        fence: SharedFence,
        acquire: impl FnOnce() -> Result<T> + Send + 'static,
    ) -> Acquirable<T> {
        Acquirable {
            fence,
            acquire: Box::new(acquire),
        }
    }

    /// Returns the fence guarding the content this view will expose.
    pub fn fence(&self) -> &SharedFence {
        &self.fence
    }

    /// Waits on the fence, performs the mapping and yields the view.
    pub fn acquire(self) -> Result<T> {
        self.fence.wait(None)?;
        (self.acquire)()
    }
}

/// An open mapping of a linear range, retired on drop.
pub(crate) struct LinearMapping {
    alloc: Arc<LinearAllocation>,
    addr: *mut u8,
    size: usize,
}

impl LinearMapping {
    pub(crate) fn open(
        alloc: Arc<LinearAllocation>,
        offset: usize,
        size: usize,
        usage: MemoryUsage,
        fence: Option<&dyn Fence>,
    ) -> Result<LinearMapping> {
        let addr = alloc.map(offset, size, usage, fence)?;
        Ok(LinearMapping { alloc, addr, size })
    }

    #[inline]
    fn addr(&self) -> *mut u8 {
        self.addr
    }

    #[inline]
    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for LinearMapping {
    fn drop(&mut self) {
        if let Err(e) = self.alloc.unmap(self.addr, self.size, None) {
            log::warn!("failed to retire linear mapping: {e}");
        }
    }
}

// SAFETY: the mapping owns its address range for its lifetime; the
// allocation it came from is Send + Sync.
unsafe impl Send for LinearMapping {}
unsafe impl Sync for LinearMapping {}

/// A writable view over the whole of a mutable block.
///
/// The view window starts out covering the full mapped range
/// (`offset() == 0`, `size() == capacity()`) and can only narrow via
/// [`sub_view`](WriteView::sub_view).
pub struct WriteView {
    mapping: LinearMapping,
    offset: usize,
    size: usize,
}

impl fmt::Debug for WriteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteView")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

impl WriteView {
    pub(crate) fn over(mapping: LinearMapping) -> WriteView {
        let size = mapping.size();
        WriteView {
            mapping,
            offset: 0,
            size,
        }
    }

    /// Returns the extent of the mapped range in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mapping.size()
    }

    /// Returns the window offset within the mapped range.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the window size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the window contents.
    #[inline]
    pub fn data(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.mapping.addr().add(self.offset), self.size) }
    }

    /// Returns the window contents, mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.mapping.addr().add(self.offset), self.size) }
    }

    /// Returns the window as a mutable slice of `T` values.
    ///
    /// # Panics
    ///
    /// Panics if the window size is not a multiple of `size_of::<T>()` or
    /// the window address is not aligned for `T`.
    #[inline]
    pub fn typed_data_mut<T>(&mut self) -> &mut [T]
    where
        T: bytemuck::AnyBitPattern + bytemuck::NoUninit,
    {
        bytemuck::cast_slice_mut(self.data_mut())
    }

    /// Narrows the view to `[offset, offset + size)` relative to the
    /// current window.
    ///
    /// Pure address arithmetic; the mapping is carried over, not redone.
    ///
    /// # Errors
    ///
    /// `BadValue` if the requested window exceeds the current one. The
    /// view is consumed either way; on failure its mapping is released.
    pub fn sub_view(self, offset: usize, size: usize) -> Result<WriteView> {
        verify_arg!(offset, offset.checked_add(size).is_some());
        verify_arg!(offset, offset + size <= self.size);
        Ok(WriteView {
            offset: self.offset + offset,
            size,
            mapping: self.mapping,
        })
    }
}

/// A read-only view over the shared range of a const block.
///
/// Cloning is cheap: clones and sub-views share the single open mapping,
/// which is retired when the last of them drops.
#[derive(Clone)]
pub struct ReadView {
    mapping: Arc<LinearMapping>,
    offset: usize,
    size: usize,
}

impl fmt::Debug for ReadView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadView")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

impl ReadView {
    pub(crate) fn over(mapping: LinearMapping) -> ReadView {
        let size = mapping.size();
        ReadView {
            mapping: Arc::new(mapping),
            offset: 0,
            size,
        }
    }

    /// Returns the extent of the mapped range in bytes (the shared range,
    /// not the original block capacity).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mapping.size()
    }

    /// Returns the window offset within the mapped range.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the window size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the window contents.
    #[inline]
    pub fn data(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.mapping.addr().add(self.offset), self.size) }
    }

    /// Returns the window as a slice of `T` values.
    ///
    /// # Panics
    ///
    /// Panics if the window size is not a multiple of `size_of::<T>()` or
    /// the window address is not aligned for `T`.
    #[inline]
    pub fn typed_data<T>(&self) -> &[T]
    where
        T: bytemuck::AnyBitPattern,
    {
        bytemuck::cast_slice(self.data())
    }

    /// Returns a new view narrowed to `[offset, offset + size)` relative
    /// to the current window.
    ///
    /// Pure address arithmetic; the mapping is shared, not redone.
    ///
    /// # Errors
    ///
    /// `BadValue` if the requested window exceeds the current one.
    pub fn sub_view(&self, offset: usize, size: usize) -> Result<ReadView> {
        verify_arg!(offset, offset.checked_add(size).is_some());
        verify_arg!(offset, offset + size <= self.size);
        Ok(ReadView {
            mapping: self.mapping.clone(),
            offset: self.offset + offset,
            size,
        })
    }
}

/// An open mapping of a graphic crop, retired on drop.
pub(crate) struct GraphicMapping {
    alloc: Arc<GraphicAllocation>,
    ptrs: PlanePtrs,
    layout: PlaneLayout,
    crop: Rect,
}

impl GraphicMapping {
    pub(crate) fn open(
        alloc: Arc<GraphicAllocation>,
        crop: Rect,
        usage: MemoryUsage,
        fence: Option<&dyn Fence>,
    ) -> Result<GraphicMapping> {
        let (ptrs, layout) = alloc.map(crop, usage, fence)?;
        Ok(GraphicMapping {
            alloc,
            ptrs,
            layout,
            crop,
        })
    }

    fn plane_slice(&self, plane: PlaneIndex) -> &[u8] {
        let info = self.layout[plane];
        let extent = info.extent(self.alloc.width(), self.alloc.height());
        unsafe { std::slice::from_raw_parts(self.ptrs.plane(plane), extent) }
    }

    /// Mutable counterpart of `plane_slice`; the `&mut self` receiver
    /// keeps two mutable plane borrows from coexisting.
    fn plane_slice_mut(&mut self, plane: PlaneIndex) -> &mut [u8] {
        let info = self.layout[plane];
        let extent = info.extent(self.alloc.width(), self.alloc.height());
        unsafe { std::slice::from_raw_parts_mut(self.ptrs.plane(plane), extent) }
    }
}

impl Drop for GraphicMapping {
    fn drop(&mut self) {
        if let Err(e) = self.alloc.unmap(None) {
            log::warn!("failed to retire graphic mapping: {e}");
        }
    }
}

// SAFETY: the mapping owns its plane addresses for its lifetime; the
// allocation it came from is Send + Sync.
unsafe impl Send for GraphicMapping {}
unsafe impl Sync for GraphicMapping {}

/// A writable view over the full surface of a mutable graphic block.
pub struct GraphicView {
    mapping: GraphicMapping,
}

impl GraphicView {
    pub(crate) fn over(mapping: GraphicMapping) -> GraphicView {
        GraphicView { mapping }
    }

    /// Returns the width of the viewed crop in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.mapping.crop.width
    }

    /// Returns the height of the viewed crop in samples.
    #[inline]
    pub fn height(&self) -> u32 {
        self.mapping.crop.height
    }

    /// Returns the viewed crop rect.
    #[inline]
    pub fn crop(&self) -> Rect {
        self.mapping.crop
    }

    /// Returns the plane layout; sample addressing within a plane follows
    /// [`PlaneInfo::sample_offset`](mediabuf_alloc::PlaneInfo::sample_offset)
    /// with the crop's `(left, top)`.
    #[inline]
    pub fn layout(&self) -> &PlaneLayout {
        &self.mapping.layout
    }

    /// Returns the full mapped extent of the given plane.
    #[inline]
    pub fn plane(&self, plane: PlaneIndex) -> &[u8] {
        self.mapping.plane_slice(plane)
    }

    /// Returns the full mapped extent of the given plane, mutably.
    #[inline]
    pub fn plane_mut(&mut self, plane: PlaneIndex) -> &mut [u8] {
        self.mapping.plane_slice_mut(plane)
    }
}

/// A read-only view over the shared crop of a const graphic block.
#[derive(Clone)]
pub struct ConstGraphicView {
    mapping: Arc<GraphicMapping>,
}

impl ConstGraphicView {
    pub(crate) fn over(mapping: GraphicMapping) -> ConstGraphicView {
        ConstGraphicView {
            mapping: Arc::new(mapping),
        }
    }

    /// Returns the width of the viewed crop in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.mapping.crop.width
    }

    /// Returns the height of the viewed crop in samples.
    #[inline]
    pub fn height(&self) -> u32 {
        self.mapping.crop.height
    }

    /// Returns the viewed crop rect.
    #[inline]
    pub fn crop(&self) -> Rect {
        self.mapping.crop
    }

    /// Returns the plane layout.
    #[inline]
    pub fn layout(&self) -> &PlaneLayout {
        &self.mapping.layout
    }

    /// Returns the full mapped extent of the given plane.
    #[inline]
    pub fn plane(&self, plane: PlaneIndex) -> &[u8] {
        self.mapping.plane_slice(plane)
    }
}
