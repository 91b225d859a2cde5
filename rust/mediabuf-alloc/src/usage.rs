use bitflags::bitflags;

bitflags! {
    /// Flags describing the intended access to an allocation or mapping.
    ///
    /// Usage is fixed when the allocation is created; every subsequent map
    /// call states the access it needs and is validated against the granted
    /// set.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemoryUsage: u64 {
        const SOFTWARE_READ = 1;
        const SOFTWARE_WRITE = 2;
    }
}

impl MemoryUsage {
    /// Software read plus write, the usage of a typical CPU producer.
    pub fn software_read_write() -> MemoryUsage {
        MemoryUsage::SOFTWARE_READ | MemoryUsage::SOFTWARE_WRITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_containment() {
        let rw = MemoryUsage::software_read_write();
        assert!(rw.contains(MemoryUsage::SOFTWARE_READ));
        assert!(rw.contains(MemoryUsage::SOFTWARE_WRITE));
        assert!(!MemoryUsage::SOFTWARE_READ.contains(rw));
        assert!(MemoryUsage::SOFTWARE_READ.contains(MemoryUsage::empty()));
    }
}
