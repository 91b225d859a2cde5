use std::sync::OnceLock;

/// Allocates zeroed memory via anonymous `mmap`.
///
/// The allocation is rounded up to the nearest page boundary and is both
/// readable and writable.
///
/// # Returns
///
/// `(ptr, capacity)` where `capacity` is the page-rounded size actually
/// mapped; pass the same capacity back to [`free`].
pub fn allocate(size: usize) -> std::io::Result<(*mut std::ffi::c_void, usize)> {
    let page_size = get_page_size();
    assert!(page_size.is_power_of_two());
    let capacity = (size.max(1) + page_size - 1) & !(page_size - 1);
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            capacity,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr.is_null() || ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    Ok((ptr, capacity))
}

/// Unmaps memory previously obtained from [`allocate`].
///
/// # Safety
///
/// `ptr` must have been returned by [`allocate`], `size` must be the
/// capacity returned alongside it, and the region must not have been freed
/// already or be referenced elsewhere.
pub unsafe fn free(ptr: *mut std::ffi::c_void, size: usize) -> std::io::Result<()> {
    let res = unsafe { libc::munmap(ptr, size) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Returns the system page size, cached after the first call.
pub fn get_page_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    if let Some(&size) = SIZE.get() {
        size
    } else {
        match read_page_size() {
            Ok(size) => {
                let _ = SIZE.set(size);
                size
            }
            Err(_) => 4 * 1024,
        }
    }
}

fn read_page_size() -> std::io::Result<usize> {
    let res = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    assert!(res < i32::MAX as _);
    Ok(res as usize)
}
