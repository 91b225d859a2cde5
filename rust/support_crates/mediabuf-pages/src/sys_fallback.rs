use std::alloc::{Layout, alloc_zeroed, dealloc};

/// Allocates zeroed, page-aligned memory from the global allocator
/// (emulated paging for targets without `mmap`).
pub fn allocate(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    let page_size = get_page_size();
    assert!(page_size.is_power_of_two());
    let capacity = (size.max(1) + page_size - 1) & !(page_size - 1);

    let layout = Layout::from_size_align(capacity, page_size)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid layout"))?;

    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::OutOfMemory,
            "failed to allocate memory",
        ));
    }

    Ok((ptr as *mut std::ffi::c_void, capacity))
}

/// Frees memory previously obtained from [`allocate`].
///
/// # Safety
///
/// `ptr`/`size` must match a prior [`allocate`] result that has not been
/// freed yet.
pub unsafe fn free(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let page_size = get_page_size();
    assert!(size.is_multiple_of(page_size));

    let layout = Layout::from_size_align(size, page_size)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid layout"))?;

    unsafe {
        dealloc(ptr as *mut u8, layout);
    }
    Ok(())
}

/// Returns the emulated page size.
pub fn get_page_size() -> usize {
    4 * 1024
}
