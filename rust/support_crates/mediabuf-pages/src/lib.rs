//! OS page memory backing the in-process system allocator.
//!
//! This crate hands out zeroed, page-aligned memory regions obtained straight
//! from the operating system: anonymous `mmap` on unix targets, aligned heap
//! allocation elsewhere. Regions do not grow and are not reused; the layers
//! above treat them as fixed-capacity backing stores whose lifetime is
//! managed by reference counting.

#[cfg_attr(unix, path = "sys_unix.rs")]
#[cfg_attr(not(unix), path = "sys_fallback.rs")]
pub mod sys;

/// An owned region of zeroed page memory.
///
/// The region stays valid at a stable address for the lifetime of the value
/// and is returned to the system on drop. `len` is the requested size; the
/// actual capacity is rounded up to a page boundary.
pub struct PageMemory {
    /// Start of the region.
    ptr: *mut u8,
    /// Requested size in bytes.
    len: usize,
    /// Allocated capacity in bytes (page multiple, >= len).
    capacity: usize,
}

impl PageMemory {
    /// Allocates a zeroed region of at least `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns the underlying OS error if the pages cannot be obtained.
    pub fn allocate(size: usize) -> std::io::Result<PageMemory> {
        let (ptr, capacity) = sys::allocate(size.max(1))?;
        assert!((ptr as usize).is_multiple_of(page_size()));
        Ok(PageMemory {
            ptr: ptr as _,
            len: size,
            capacity,
        })
    }

    /// Returns the requested length of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the region has a length of 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the allocated capacity in bytes (a page multiple).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a raw pointer to the start of the region.
    ///
    /// The pointer must not be used after the `PageMemory` is dropped.
    #[inline]
    pub fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Returns the alignment of the region (the system page size).
    #[inline]
    pub fn alignment(&self) -> usize {
        page_size()
    }

    /// Returns the region contents as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    /// Returns the region contents as a mutable byte slice.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for PageMemory {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            let _ = unsafe { sys::free(self.ptr as _, self.capacity) };
        }
    }
}

// SAFETY: PageMemory exclusively owns its region and releases it on drop.
unsafe impl Send for PageMemory {}

// SAFETY: shared access to the region is read-only through &self; callers
// synchronize any interior mutation externally.
unsafe impl Sync for PageMemory {}

impl std::fmt::Debug for PageMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageMemory")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Returns the system page size in bytes.
pub fn page_size() -> usize {
    sys::get_page_size()
}
