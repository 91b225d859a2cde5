//! Typed buffer metadata.
//!
//! A buffer stores at most one metadata object per concrete type; the
//! concrete `TypeId` is the metadata type identifier.

use std::any::Any;
use std::sync::Arc;

/// Marker trait for typed metadata attachable to a buffer.
///
/// Implement it on any `'static` value type:
///
/// ```
/// use mediabuf::BufferInfo;
///
/// #[derive(Debug, PartialEq)]
/// struct FrameIndex(u64);
///
/// impl BufferInfo for FrameIndex {}
/// ```
pub trait BufferInfo: Any + Send + Sync + std::fmt::Debug {}

/// Returns the concrete type identifier of a metadata object.
///
/// Upcasts to `dyn Any` first: `type_id` must dispatch to the concrete
/// value, not report the trait-object type.
pub(crate) fn info_type_id(info: &dyn BufferInfo) -> std::any::TypeId {
    let any: &dyn Any = info;
    any.type_id()
}

/// Downcasts a shared metadata object to its concrete type.
pub fn downcast_info<T: BufferInfo>(info: Arc<dyn BufferInfo>) -> Option<Arc<T>> {
    let any: Arc<dyn Any + Send + Sync> = info;
    any.downcast::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sample(u32);

    impl BufferInfo for Sample {}

    #[derive(Debug)]
    struct Other;

    impl BufferInfo for Other {}

    #[test]
    fn test_type_id_is_concrete() {
        let info: Arc<dyn BufferInfo> = Arc::new(Sample(7));
        assert_eq!(info_type_id(&*info), std::any::TypeId::of::<Sample>());
        assert_ne!(info_type_id(&*info), std::any::TypeId::of::<Other>());
    }

    #[test]
    fn test_downcast_info() {
        let info: Arc<dyn BufferInfo> = Arc::new(Sample(7));
        assert!(downcast_info::<Other>(info.clone()).is_none());
        let sample = downcast_info::<Sample>(info).unwrap();
        assert_eq!(*sample, Sample(7));
    }
}
