//! The buffer aggregate: same-kind const blocks plus typed metadata and
//! destroy notification.

use std::any::TypeId;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use mediabuf_block::{ConstGraphicBlock, ConstLinearBlock};
use mediabuf_common::Result;
use mediabuf_common::error::Error;

use crate::data::BufferData;
use crate::info::{BufferInfo, info_type_id};

/// Identity of a buffer object, handed to destroy-notification callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> BufferId {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        BufferId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Callback invoked when the last owner of a buffer drops it, receiving
/// the buffer identity and the argument it was registered with.
pub type OnDestroyNotify = fn(BufferId, usize);

struct Registration {
    callback: OnDestroyNotify,
    arg: usize,
}

impl Registration {
    fn matches(&self, callback: OnDestroyNotify, arg: usize) -> bool {
        std::ptr::fn_addr_eq(self.callback, callback) && self.arg == arg
    }
}

struct Shared {
    id: BufferId,
    data: BufferData,
    infos: Mutex<Vec<(TypeId, Arc<dyn BufferInfo>)>>,
    registrations: Mutex<Vec<Registration>>,
    notified: AtomicBool,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Single-shot even if concurrent owners race their final drops;
        // callbacks see the buffer identity but must not assume any block
        // is still mapped. The blocks are released after this returns.
        if self
            .notified
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let registrations = std::mem::take(&mut *self.registrations.lock().unwrap());
            for registration in registrations {
                (registration.callback)(self.id, registration.arg);
            }
        }
    }
}

/// An aggregate, reference-counted collection of same-kind const blocks
/// with attached typed metadata and destroy notification.
///
/// Cloning shares ownership; the aggregate is destroyed when the last
/// owner drops, at which point every still-registered destroy callback
/// fires exactly once, in registration order, on the dropping thread.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<Shared>,
}

impl Buffer {
    /// Creates a buffer over the given block list.
    pub fn new(data: BufferData) -> Buffer {
        let id = BufferId::next();
        log::debug!("created buffer {id:?}: {data:?}");
        Buffer {
            shared: Arc::new(Shared {
                id,
                data,
                infos: Mutex::new(Vec::new()),
                registrations: Mutex::new(Vec::new()),
                notified: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a buffer over an ordered list of linear blocks.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` is empty.
    pub fn from_linear_blocks(blocks: Vec<ConstLinearBlock>) -> Buffer {
        Buffer::new(BufferData::from_linear_blocks(blocks))
    }

    /// Creates a buffer over an ordered list of graphic blocks.
    ///
    /// # Panics
    ///
    /// Panics if `blocks` is empty.
    pub fn from_graphic_blocks(blocks: Vec<ConstGraphicBlock>) -> Buffer {
        Buffer::new(BufferData::from_graphic_blocks(blocks))
    }

    /// Returns the identity of this buffer object.
    #[inline]
    pub fn id(&self) -> BufferId {
        self.shared.id
    }

    /// Returns the classified block list.
    #[inline]
    pub fn data(&self) -> &BufferData {
        &self.shared.data
    }

    /// Inserts or replaces the single metadata object of `info`'s concrete
    /// type. Replacement keeps the original insertion slot.
    pub fn set_info(&self, info: Arc<dyn BufferInfo>) {
        let type_id = info_type_id(&*info);
        let mut infos = self.shared.infos.lock().unwrap();
        match infos.iter_mut().find(|(id, _)| *id == type_id) {
            Some(slot) => slot.1 = info,
            None => infos.push((type_id, info)),
        }
    }

    /// Returns `true` if metadata of type `T` is attached.
    pub fn has_info<T: BufferInfo>(&self) -> bool {
        self.has_info_id(TypeId::of::<T>())
    }

    /// Returns `true` if metadata with the given type identifier is
    /// attached.
    pub fn has_info_id(&self, type_id: TypeId) -> bool {
        self.shared
            .infos
            .lock()
            .unwrap()
            .iter()
            .any(|(id, _)| *id == type_id)
    }

    /// Returns the attached metadata object of type `T`, if any.
    pub fn info<T: BufferInfo>(&self) -> Option<Arc<T>> {
        let infos = self.shared.infos.lock().unwrap();
        let info = infos
            .iter()
            .find(|(id, _)| *id == TypeId::of::<T>())
            .map(|(_, info)| info.clone())?;
        drop(infos);
        crate::info::downcast_info(info)
    }

    /// Removes and returns the metadata object of type `T`.
    ///
    /// Absence is a normal outcome, reported as `None`.
    pub fn remove_info<T: BufferInfo>(&self) -> Option<Arc<dyn BufferInfo>> {
        self.remove_info_id(TypeId::of::<T>())
    }

    /// Removes and returns the metadata object with the given type
    /// identifier, if attached.
    pub fn remove_info_id(&self, type_id: TypeId) -> Option<Arc<dyn BufferInfo>> {
        let mut infos = self.shared.infos.lock().unwrap();
        let index = infos.iter().position(|(id, _)| *id == type_id)?;
        Some(infos.remove(index).1)
    }

    /// Returns the attached metadata objects in insertion order.
    ///
    /// The order is stable for a given metadata state.
    pub fn infos(&self) -> Vec<Arc<dyn BufferInfo>> {
        self.shared
            .infos
            .lock()
            .unwrap()
            .iter()
            .map(|(_, info)| info.clone())
            .collect()
    }

    /// Registers a callback to run when the buffer is destroyed.
    ///
    /// # Errors
    ///
    /// `Duplicate` if the identical `(callback, arg)` pair is already
    /// registered; the registration is not doubled.
    pub fn register_on_destroy_notify(
        &self,
        callback: OnDestroyNotify,
        arg: usize,
    ) -> Result<()> {
        let mut registrations = self.shared.registrations.lock().unwrap();
        if registrations.iter().any(|r| r.matches(callback, arg)) {
            return Err(Error::duplicate("destroy notification"));
        }
        registrations.push(Registration { callback, arg });
        Ok(())
    }

    /// Removes a destroy-notification registration.
    ///
    /// # Errors
    ///
    /// `NotFound` if no exact `(callback, arg)` match is registered.
    pub fn unregister_on_destroy_notify(
        &self,
        callback: OnDestroyNotify,
        arg: usize,
    ) -> Result<()> {
        let mut registrations = self.shared.registrations.lock().unwrap();
        match registrations.iter().position(|r| r.matches(callback, arg)) {
            Some(index) => {
                registrations.remove(index);
                Ok(())
            }
            None => Err(Error::not_found("destroy notification")),
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.shared.id)
            .field("data", &self.shared.data)
            .finish_non_exhaustive()
    }
}
