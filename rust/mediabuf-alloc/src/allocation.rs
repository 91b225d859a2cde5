//! Owned allocations and the provider boundary.
//!
//! An allocation owns raw backing memory obtained from a [`RawAllocator`]
//! and hands out process-local addresses through `map`/`unmap`. The model
//! treats mapping as a blocking, synchronous operation: it may wait on the
//! supplied fence before the address is handed out. Exactly one mapping may
//! be open on an allocation at any time; the previous mapping must be
//! retired through `unmap` before the next `map` call succeeds.

use std::ops::Index;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use mediabuf_common::error::Error;
use mediabuf_common::fence::Fence;
use mediabuf_common::{Result, verify_arg};

use crate::geometry::{PLANE_COUNT, PixelFormat, PlaneIndex, PlaneLayout, Rect};
use crate::usage::MemoryUsage;

/// Provider-owned raw backing memory.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - The region returned by `region()` remains valid at a stable address
///   for the entire lifetime of the owner.
/// - The reported capacity is accurate.
/// - The region is not aliased by another mutable owner.
pub unsafe trait RawMemory: Send + Sync {
    /// Returns the owned memory region.
    fn region(&self) -> MemoryRegion;
}

/// A raw memory region with its size information.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRegion {
    /// Pointer to the start of the region.
    pub ptr: *mut u8,
    /// Total capacity of the region in bytes.
    pub capacity: usize,
    /// Formal alignment of the region.
    pub alignment: usize,
}

/// Unique identity of an allocation.
///
/// Handles survive sharing: every block or const block sliced from an
/// allocation reports the same handle, which is how aggregated buffers are
/// correlated back to the blocks they were built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllocationHandle(u64);

impl AllocationHandle {
    fn next() -> AllocationHandle {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        AllocationHandle(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Obtains backing memory from an external provider and wraps it in owned
/// allocations.
pub trait RawAllocator: Send + Sync {
    /// Allocates a flat byte range of the given capacity.
    fn allocate_linear(&self, capacity: usize, usage: MemoryUsage) -> Result<LinearAllocation>;

    /// Allocates a two-dimensional, multi-plane pixel store.
    fn allocate_graphic(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicAllocation>;
}

#[derive(Clone, Copy)]
struct MapRange {
    offset: usize,
    size: usize,
}

/// An owned handle to a flat range of raw memory.
pub struct LinearAllocation {
    memory: Box<dyn RawMemory>,
    capacity: usize,
    usage: MemoryUsage,
    handle: AllocationHandle,
    mapped: Mutex<Option<MapRange>>,
}

impl LinearAllocation {
    /// Wraps provider memory in a linear allocation of the given capacity
    /// and granted usage.
    ///
    /// # Errors
    ///
    /// `BadValue` if `capacity` is zero or exceeds the provider region.
    pub fn new(
        memory: Box<dyn RawMemory>,
        capacity: usize,
        usage: MemoryUsage,
    ) -> Result<LinearAllocation> {
        let region = memory.region();
        verify_arg!(capacity, capacity > 0);
        verify_arg!(capacity, capacity <= region.capacity);
        Ok(LinearAllocation {
            memory,
            capacity,
            usage,
            handle: AllocationHandle::next(),
            mapped: Mutex::new(None),
        })
    }

    /// Returns the capacity of the allocation in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the usage granted at allocation time.
    #[inline]
    pub fn usage(&self) -> MemoryUsage {
        self.usage
    }

    /// Returns the unique identity of this allocation.
    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.handle
    }

    /// Maps `[offset, offset + size)` and returns its process-local
    /// address.
    ///
    /// Waits on `fence` (if any) before the address is handed out, so the
    /// caller observes every write the producer issued before signaling.
    ///
    /// # Errors
    ///
    /// - `BadValue` if the range is empty or exceeds the capacity.
    /// - `NoPermission` if `usage` requests access not granted at
    ///   allocation time.
    /// - `Refused` if another mapping is still open.
    pub fn map(
        &self,
        offset: usize,
        size: usize,
        usage: MemoryUsage,
        fence: Option<&dyn Fence>,
    ) -> Result<*mut u8> {
        verify_arg!(size, size > 0);
        verify_arg!(offset, offset.checked_add(size).is_some());
        verify_arg!(offset, offset + size <= self.capacity);
        self.check_usage(usage)?;

        let mut mapped = self.mapped.lock().unwrap();
        if mapped.is_some() {
            return Err(Error::refused("linear allocation is already mapped"));
        }
        if let Some(fence) = fence {
            fence.wait(None)?;
        }
        *mapped = Some(MapRange { offset, size });
        log::debug!(
            "mapped linear allocation {:?}: offset={offset} size={size}",
            self.handle
        );
        Ok(unsafe { self.memory.region().ptr.add(offset) })
    }

    /// Retires the mapping previously returned by [`map`](Self::map).
    ///
    /// Waits on `fence` (if any) before the range is retired, so a
    /// consumer-supplied release fence gates reuse of the memory.
    ///
    /// # Errors
    ///
    /// `BadValue` if `(addr, size)` does not match the open mapping.
    pub fn unmap(&self, addr: *mut u8, size: usize, fence: Option<&dyn Fence>) -> Result<()> {
        let mut mapped = self.mapped.lock().unwrap();
        let matches = mapped.is_some_and(|range| {
            size == range.size && addr == unsafe { self.memory.region().ptr.add(range.offset) }
        });
        if !matches {
            return Err(Error::bad_value(
                "addr",
                "does not match an open linear mapping",
            ));
        }
        if let Some(fence) = fence {
            fence.wait(None)?;
        }
        *mapped = None;
        Ok(())
    }

    fn check_usage(&self, usage: MemoryUsage) -> Result<()> {
        if self.usage.contains(usage) {
            Ok(())
        } else {
            Err(Error::no_permission(format!(
                "requested {usage:?}, granted {:?}",
                self.usage
            )))
        }
    }
}

impl std::fmt::Debug for LinearAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearAllocation")
            .field("handle", &self.handle)
            .field("capacity", &self.capacity)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// One base address per plane, as returned by a graphic map call.
#[derive(Clone, Copy, Debug)]
pub struct PlanePtrs {
    ptrs: [*mut u8; PLANE_COUNT],
}

impl PlanePtrs {
    pub(crate) fn new(ptrs: [*mut u8; PLANE_COUNT]) -> PlanePtrs {
        PlanePtrs { ptrs }
    }

    /// Returns the base address of the given plane.
    #[inline]
    pub fn plane(&self, plane: PlaneIndex) -> *mut u8 {
        self.ptrs[plane as usize]
    }
}

impl Index<PlaneIndex> for PlanePtrs {
    type Output = *mut u8;

    #[inline]
    fn index(&self, plane: PlaneIndex) -> &*mut u8 {
        &self.ptrs[plane as usize]
    }
}

/// An owned handle to a two-dimensional, multi-plane pixel store.
pub struct GraphicAllocation {
    memory: Box<dyn RawMemory>,
    width: u32,
    height: u32,
    format: PixelFormat,
    layout: PlaneLayout,
    usage: MemoryUsage,
    handle: AllocationHandle,
    mapped: Mutex<Option<Rect>>,
}

impl GraphicAllocation {
    /// Wraps provider memory in a graphic allocation with the plane layout
    /// the provider committed to.
    ///
    /// # Errors
    ///
    /// `BadValue` if the dimensions are zero or any plane's extent exceeds
    /// the provider region.
    pub fn new(
        memory: Box<dyn RawMemory>,
        width: u32,
        height: u32,
        format: PixelFormat,
        layout: PlaneLayout,
        usage: MemoryUsage,
    ) -> Result<GraphicAllocation> {
        let region = memory.region();
        verify_arg!(width, width > 0);
        verify_arg!(height, height > 0);
        for (_, plane) in layout.iter() {
            verify_arg!(
                layout,
                plane.offset + plane.extent(width, height) <= region.capacity
            );
        }
        Ok(GraphicAllocation {
            memory,
            width,
            height,
            format,
            layout,
            usage,
            handle: AllocationHandle::next(),
            mapped: Mutex::new(None),
        })
    }

    /// Returns the width of the allocation in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the allocation in samples.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the pixel format of the allocation.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Returns the plane layout committed by the provider.
    #[inline]
    pub fn layout(&self) -> &PlaneLayout {
        &self.layout
    }

    /// Returns the usage granted at allocation time.
    #[inline]
    pub fn usage(&self) -> MemoryUsage {
        self.usage
    }

    /// Returns the unique identity of this allocation.
    #[inline]
    pub fn handle(&self) -> AllocationHandle {
        self.handle
    }

    /// Maps the given crop rect and returns one base address per plane
    /// plus the plane layout.
    ///
    /// The returned addresses are plane bases (the plane offset applied);
    /// addressing within a plane follows
    /// [`PlaneInfo::sample_offset`](crate::geometry::PlaneInfo::sample_offset)
    /// with the crop's `(left, top)`.
    ///
    /// # Errors
    ///
    /// - `BadValue` if the rect is empty or exceeds the allocation
    ///   dimensions.
    /// - `NoPermission` if `usage` requests access not granted at
    ///   allocation time.
    /// - `Refused` if another mapping is still open.
    pub fn map(
        &self,
        rect: Rect,
        usage: MemoryUsage,
        fence: Option<&dyn Fence>,
    ) -> Result<(PlanePtrs, PlaneLayout)> {
        verify_arg!(rect, rect.width > 0 && rect.height > 0);
        verify_arg!(rect, rect.fits_within(self.width, self.height));
        self.check_usage(usage)?;

        let mut mapped = self.mapped.lock().unwrap();
        if mapped.is_some() {
            return Err(Error::refused("graphic allocation is already mapped"));
        }
        if let Some(fence) = fence {
            fence.wait(None)?;
        }
        *mapped = Some(rect);

        let base = self.memory.region().ptr;
        let mut ptrs = [std::ptr::null_mut(); PLANE_COUNT];
        for (index, plane) in self.layout.iter() {
            ptrs[index as usize] = unsafe { base.add(plane.offset) };
        }
        log::debug!("mapped graphic allocation {:?}: rect={rect:?}", self.handle);
        Ok((PlanePtrs::new(ptrs), self.layout))
    }

    /// Retires the open mapping.
    ///
    /// # Errors
    ///
    /// `BadValue` if no mapping is open.
    pub fn unmap(&self, fence: Option<&dyn Fence>) -> Result<()> {
        let mut mapped = self.mapped.lock().unwrap();
        if mapped.is_none() {
            return Err(Error::bad_value("mapping", "no open graphic mapping"));
        }
        if let Some(fence) = fence {
            fence.wait(None)?;
        }
        *mapped = None;
        Ok(())
    }

    fn check_usage(&self, usage: MemoryUsage) -> Result<()> {
        if self.usage.contains(usage) {
            Ok(())
        } else {
            Err(Error::no_permission(format!(
                "requested {usage:?}, granted {:?}",
                self.usage
            )))
        }
    }
}

impl std::fmt::Debug for GraphicAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicAllocation")
            .field("handle", &self.handle)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediabuf_common::error::ErrorKind;
    use mediabuf_pages::PageMemory;

    fn linear(capacity: usize, usage: MemoryUsage) -> LinearAllocation {
        let memory = PageMemory::allocate(capacity).unwrap();
        LinearAllocation::new(Box::new(memory), capacity, usage).unwrap()
    }

    #[test]
    fn test_linear_map_bounds() {
        let alloc = linear(1024, MemoryUsage::software_read_write());
        assert!(matches!(
            alloc.map(0, 0, MemoryUsage::SOFTWARE_READ, None),
            Err(e) if matches!(e.kind(), ErrorKind::BadValue { .. })
        ));
        assert!(matches!(
            alloc.map(1, 1024, MemoryUsage::SOFTWARE_READ, None),
            Err(e) if matches!(e.kind(), ErrorKind::BadValue { .. })
        ));
        assert!(matches!(
            alloc.map(usize::MAX, 2, MemoryUsage::SOFTWARE_READ, None),
            Err(e) if matches!(e.kind(), ErrorKind::BadValue { .. })
        ));

        let addr = alloc.map(0, 1024, MemoryUsage::SOFTWARE_READ, None).unwrap();
        assert!(!addr.is_null());
        alloc.unmap(addr, 1024, None).unwrap();
    }

    #[test]
    fn test_linear_usage_validation() {
        let alloc = linear(64, MemoryUsage::SOFTWARE_READ);
        let err = alloc
            .map(0, 64, MemoryUsage::software_read_write(), None)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NoPermission { .. }));

        let addr = alloc.map(0, 64, MemoryUsage::SOFTWARE_READ, None).unwrap();
        alloc.unmap(addr, 64, None).unwrap();
    }

    #[test]
    fn test_linear_single_mapping() {
        let alloc = linear(256, MemoryUsage::software_read_write());
        let addr = alloc.map(0, 256, MemoryUsage::SOFTWARE_READ, None).unwrap();

        let err = alloc
            .map(0, 128, MemoryUsage::SOFTWARE_READ, None)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Refused { .. }));

        alloc.unmap(addr, 256, None).unwrap();
        let addr = alloc.map(0, 128, MemoryUsage::SOFTWARE_READ, None).unwrap();
        alloc.unmap(addr, 128, None).unwrap();
    }

    #[test]
    fn test_linear_unmap_mismatch() {
        let alloc = linear(256, MemoryUsage::software_read_write());
        let addr = alloc
            .map(16, 64, MemoryUsage::SOFTWARE_READ, None)
            .unwrap();

        assert!(alloc.unmap(addr, 32, None).is_err());
        assert!(alloc.unmap(unsafe { addr.add(1) }, 64, None).is_err());
        alloc.unmap(addr, 64, None).unwrap();
        assert!(alloc.unmap(addr, 64, None).is_err());
    }

    #[test]
    fn test_linear_write_then_remap_subrange() {
        const CAPACITY: usize = 64 * 1024;
        let alloc = linear(CAPACITY, MemoryUsage::software_read_write());

        let addr = alloc
            .map(0, CAPACITY, MemoryUsage::software_read_write(), None)
            .unwrap();
        unsafe {
            for i in 0..CAPACITY {
                addr.add(i).write((i % 100) as u8);
            }
        }
        alloc.unmap(addr, CAPACITY, None).unwrap();

        let third = CAPACITY / 3;
        let addr = alloc
            .map(third, third, MemoryUsage::SOFTWARE_READ, None)
            .unwrap();
        for i in 0..third {
            assert_eq!(unsafe { addr.add(i).read() }, ((i + third) % 100) as u8);
        }
        alloc.unmap(addr, third, None).unwrap();
    }

    #[test]
    fn test_handles_are_unique() {
        let a = linear(16, MemoryUsage::SOFTWARE_READ);
        let b = linear(16, MemoryUsage::SOFTWARE_READ);
        assert_ne!(a.handle(), b.handle());
    }
}
