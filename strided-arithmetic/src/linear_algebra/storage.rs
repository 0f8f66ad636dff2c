use std::alloc::Layout;
use std::cell::Cell;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use log::{trace, warn};

use crate::error::AllocError;
use crate::memory_resource::ResourceRef;

/// A contiguous run of initialized `T`s living in memory obtained from `resource`.
///
/// Elements are dropped and the memory is handed back to `resource` when the buffer is dropped, which
/// for a buffer behind an `Rc` happens exactly once, when the last share goes away.
pub(crate) struct OwnedBuffer<T> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
    resource: ResourceRef,
}

/// Cleans up a partially initialized buffer if filling it panics.
struct FillGuard<'r, T> {
    ptr: NonNull<T>,
    initialized: usize,
    layout: Layout,
    resource: &'r ResourceRef,
}

impl<T> Drop for FillGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: exactly the first `initialized` slots were written, and the block came from
        // `resource` with `layout`
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.initialized,
            ));
            self.resource.deallocate(self.ptr.cast(), self.layout);
        }
    }
}

impl<T> OwnedBuffer<T> {
    /// Allocate room for `capacity` elements and move in at most `capacity` items from `items`.
    /// The buffer's length is the number of items actually written.
    pub(crate) fn from_iter_in(
        capacity: usize,
        resource: ResourceRef,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self, AllocError> {
        let layout = Layout::array::<T>(capacity)?;
        let ptr = match resource.allocate(layout) {
            Ok(ptr) => ptr.cast::<T>(),
            Err(e) => {
                warn!(
                    "failed to allocate {capacity} elements ({} bytes) from '{}': {e}",
                    layout.size(),
                    resource.name()
                );
                return Err(e);
            }
        };

        let mut guard = FillGuard {
            ptr,
            initialized: 0,
            layout,
            resource: &resource,
        };
        for item in items.into_iter().take(capacity) {
            // SAFETY: initialized < capacity, the slot is inside the block
            unsafe { ptr.as_ptr().add(guard.initialized).write(item) };
            guard.initialized += 1;
        }
        let len = guard.initialized;
        mem::forget(guard);

        trace!(
            "allocated buffer of {len} elements ({} bytes) from '{}'",
            layout.size(),
            resource.name()
        );
        Ok(Self {
            ptr,
            len,
            layout,
            resource,
        })
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn resource(&self) -> &ResourceRef {
        &self.resource
    }
}

impl<T> Drop for OwnedBuffer<T> {
    fn drop(&mut self) {
        trace!(
            "releasing buffer of {} elements to '{}'",
            self.len,
            self.resource.name()
        );
        // SAFETY: the first `len` slots are initialized and the block came from `resource` with
        // `layout`; this runs once
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len));
            self.resource.deallocate(self.ptr.cast(), self.layout);
        }
    }
}

/// Where a vector's elements live.
pub(crate) enum Storage<'a, T> {
    /// No storage at all (default-constructed or moved-from vectors).
    Empty,
    /// Storage shared by reference count with every clone of the vector.
    Owned(Rc<OwnedBuffer<T>>),
    /// Caller-provided memory, never freed by the vector. `shared` is set on both sides once the
    /// view has been cloned and never cleared.
    External {
        shared: Cell<bool>,
        _borrow: PhantomData<&'a mut ()>,
    },
}

impl<T> Clone for Storage<'_, T> {
    fn clone(&self) -> Self {
        match self {
            Storage::Empty => Storage::Empty,
            Storage::Owned(buffer) => Storage::Owned(Rc::clone(buffer)),
            Storage::External { shared, .. } => {
                shared.set(true);
                Storage::external(true)
            }
        }
    }
}

impl<T> Storage<'_, T> {
    pub(crate) fn external(shared: bool) -> Self {
        Storage::External {
            shared: Cell::new(shared),
            _borrow: PhantomData,
        }
    }

    pub(crate) fn ref_count(&self) -> Option<usize> {
        match self {
            Storage::Owned(buffer) => Some(Rc::strong_count(buffer)),
            _ => None,
        }
    }

    pub(crate) fn resource(&self) -> Option<&ResourceRef> {
        match self {
            Storage::Owned(buffer) => Some(buffer.resource()),
            _ => None,
        }
    }

    /// No other handle can reach these elements.
    pub(crate) fn is_unique(&self) -> bool {
        match self {
            Storage::Empty => true,
            Storage::Owned(buffer) => Rc::strong_count(buffer) == 1 && Rc::weak_count(buffer) == 0,
            Storage::External { shared, .. } => !shared.get(),
        }
    }
}
