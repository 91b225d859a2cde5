//! The default in-process provider, backed by OS page memory.
//!
//! `SystemAllocator` stands in for platform providers (ion/gralloc-style
//! backends) so the memory model is usable and testable without platform
//! integration. It grants exactly the requested usage and lays out planar
//! formats itself.

use mediabuf_common::Result;
use mediabuf_common::error::Error;
use mediabuf_pages::PageMemory;

use crate::allocation::{
    GraphicAllocation, LinearAllocation, MemoryRegion, RawAllocator, RawMemory,
};
use crate::geometry::{PixelFormat, PlaneInfo, PlaneLayout};
use crate::usage::MemoryUsage;

// SAFETY: PageMemory owns its region, keeps it valid at a stable address
// for its lifetime, and reports its true capacity.
unsafe impl RawMemory for PageMemory {
    fn region(&self) -> MemoryRegion {
        MemoryRegion {
            ptr: self.ptr(),
            capacity: self.capacity(),
            alignment: self.alignment(),
        }
    }
}

/// Allocates linear ranges and planar graphic surfaces from OS page
/// memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Row stride alignment for plane scanlines, matching what hardware
    /// producers commonly require of CPU-visible surfaces.
    pub const ROW_ALIGNMENT: usize = 64;

    pub fn new() -> SystemAllocator {
        SystemAllocator
    }

    fn allocate_pages(&self, size: usize) -> Result<PageMemory> {
        PageMemory::allocate(size).map_err(|e| {
            if e.kind() == std::io::ErrorKind::OutOfMemory {
                Error::no_memory(format!("page allocation of {size} bytes"))
            } else {
                Error::io(format!("page allocation of {size} bytes"), e)
            }
        })
    }
}

impl RawAllocator for SystemAllocator {
    fn allocate_linear(&self, capacity: usize, usage: MemoryUsage) -> Result<LinearAllocation> {
        let memory = self.allocate_pages(capacity)?;
        log::debug!("allocated linear range: capacity={capacity} usage={usage:?}");
        LinearAllocation::new(Box::new(memory), capacity, usage)
    }

    fn allocate_graphic(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: MemoryUsage,
    ) -> Result<GraphicAllocation> {
        let layout = match format {
            PixelFormat::Yuv420Planar => yuv420_layout(width, height),
        };
        let size = layout
            .iter()
            .map(|(_, plane)| plane.offset + plane.extent(width, height))
            .max()
            .unwrap_or(0);
        let memory = self.allocate_pages(size)?;
        log::debug!("allocated graphic surface: {width}x{height} {format:?} usage={usage:?}");
        GraphicAllocation::new(Box::new(memory), width, height, format, layout, usage)
    }
}

/// Computes the canonical three-plane 4:2:0 layout: full-resolution luma,
/// then U and V subsampled 2x2, each plane's rows padded to
/// [`SystemAllocator::ROW_ALIGNMENT`].
fn yuv420_layout(width: u32, height: u32) -> PlaneLayout {
    let y_stride = align_up(width as usize, SystemAllocator::ROW_ALIGNMENT);
    let c_stride = align_up(width.div_ceil(2) as usize, SystemAllocator::ROW_ALIGNMENT);
    let y_size = y_stride * height as usize;
    let c_size = c_stride * height.div_ceil(2) as usize;
    let chroma = |offset| PlaneInfo {
        offset,
        row_inc: c_stride,
        col_inc: 1,
        horiz_subsampling: 2,
        vert_subsampling: 2,
    };
    PlaneLayout::new([
        PlaneInfo {
            offset: 0,
            row_inc: y_stride,
            col_inc: 1,
            horiz_subsampling: 1,
            vert_subsampling: 1,
        },
        chroma(y_size),
        chroma(y_size + c_size),
    ])
}

fn align_up(n: usize, alignment: usize) -> usize {
    (n + alignment - 1) & !(alignment - 1)
}
