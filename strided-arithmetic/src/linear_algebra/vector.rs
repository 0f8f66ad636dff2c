use std::fmt::{self, Debug};
use std::ops::{Index, IndexMut};
use std::ptr;
use std::rc::Rc;

use log::debug;
use nalgebra::{Const, Dyn};

use crate::error::{Result, VectorError};
use crate::linear_algebra::storage::{OwnedBuffer, Storage};
use crate::linear_algebra::Scalar;
use crate::memory_resource::{default_resource, ResourceRef};

/// A strided sequence of scalars, either owning reference-counted storage obtained from a
/// [`MemoryResource`](crate::memory_resource::MemoryResource) or viewing memory borrowed for `'a`.
///
/// Element `i` lives at `as_ptr().add(i * step())`.
///
/// `Clone` is cheap: the clone shares the same buffer and bumps its reference count. Use
/// [`Vector::deep_clone`] for independent storage. The buffer is released when the last share is
/// dropped; borrowed memory is never released.
///
/// # Aliasing
///
/// All handles sharing a buffer see the same elements. Mutable references (`at_mut`, `get_mut`,
/// `IndexMut`, `iter_mut`, `begin_mut`, `as_mut_slice`) are only handed out while the handle is
/// unique, see [`Vector::is_unique`]. Writing through one share so that the others observe it goes
/// through [`Vector::replace_shared`]. Vectors are neither `Send` nor `Sync`.
pub struct Vector<'a, T> {
    ptr: *mut T,
    len: usize,
    step: usize,
    storage: Storage<'a, T>,
}

/// Number of elements reachable with stride `step` inside `raw_len` slots.
#[inline]
pub(crate) const fn strided_len(raw_len: usize, step: usize) -> usize {
    if raw_len == 0 {
        0
    } else {
        (raw_len - 1) / step + 1
    }
}

impl<T> Vector<'static, T> {
    /// An empty vector without any storage.
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
            step: 1,
            storage: Storage::Empty,
        }
    }

    /// `len` default-valued elements from this thread's default resource.
    pub fn new(len: usize) -> Result<Self>
    where
        T: Default,
    {
        Self::new_in(len, default_resource())
    }

    /// `len` default-valued elements allocated from `resource`.
    pub fn new_in(len: usize, resource: ResourceRef) -> Result<Self>
    where
        T: Default,
    {
        Self::from_fn_in(len, resource, |_| T::default())
    }

    pub fn from_fn(len: usize, f: impl FnMut(usize) -> T) -> Result<Self> {
        Self::from_fn_in(len, default_resource(), f)
    }

    /// Element `i` is initialized with `f(i)`.
    pub fn from_fn_in(len: usize, resource: ResourceRef, f: impl FnMut(usize) -> T) -> Result<Self> {
        Self::from_exact_iter_in(len, resource, (0..len).map(f))
    }

    /// Copies `values` in order into fresh storage from the default resource.
    pub fn from_values(values: &[T]) -> Result<Self>
    where
        T: Clone,
    {
        Self::from_values_in(values, default_resource())
    }

    pub fn from_values_in(values: &[T], resource: ResourceRef) -> Result<Self>
    where
        T: Clone,
    {
        Self::from_exact_iter_in(values.len(), resource, values.iter().cloned())
    }

    pub(crate) fn from_exact_iter_in(
        len: usize,
        resource: ResourceRef,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self> {
        let buffer = OwnedBuffer::from_iter_in(len, resource, items)?;
        Ok(Self {
            ptr: buffer.as_ptr(),
            len: buffer.len(),
            step: 1,
            storage: Storage::Owned(Rc::new(buffer)),
        })
    }
}

impl<'a, T> Vector<'a, T> {
    /// Views `buf` without copying. Nothing is allocated and `buf` is never freed.
    pub fn from_external(buf: &'a mut [T]) -> Self {
        Self {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            step: 1,
            storage: Storage::external(false),
        }
    }

    /// Views every `step`-th element of `buf`, starting with the first.
    pub fn from_external_strided(buf: &'a mut [T], step: usize) -> Result<Self> {
        if step == 0 {
            return Err(VectorError::InvalidStep);
        }
        Ok(Self {
            ptr: buf.as_mut_ptr(),
            len: strided_len(buf.len(), step),
            step,
            storage: Storage::external(false),
        })
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` consecutive `T`s for `'a`, and the memory
    /// must not be accessed through other pointers while the vector (or any clone) is in use.
    pub unsafe fn from_raw_parts(ptr: *mut T, len: usize) -> Self {
        Self {
            ptr,
            len,
            step: 1,
            storage: Storage::external(false),
        }
    }

    /// Strided counterpart of [`Vector::from_raw_parts`]; the vector has
    /// `(raw_len - 1) / step + 1` elements (none if `raw_len == 0`).
    ///
    /// # Safety
    ///
    /// Same as [`Vector::from_raw_parts`], for `raw_len` consecutive `T`s.
    pub unsafe fn from_raw_parts_strided(ptr: *mut T, raw_len: usize, step: usize) -> Result<Self> {
        if step == 0 {
            return Err(VectorError::InvalidStep);
        }
        Ok(Self {
            ptr,
            len: strided_len(raw_len, step),
            step,
            storage: Storage::external(false),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.step == 1
    }

    /// Number of vectors sharing this vector's owned buffer, `None` for external or empty vectors.
    pub fn ref_count(&self) -> Option<usize> {
        self.storage.ref_count()
    }

    /// The resource the owned buffer came from, `None` for external or empty vectors.
    pub fn resource(&self) -> Option<&ResourceRef> {
        self.storage.resource()
    }

    /// Whether no other handle can reach this vector's elements: the owned buffer has a single
    /// share, or the external view was never cloned. Mutable references require this.
    pub fn is_unique(&self) -> bool {
        self.storage.is_unique()
    }

    /// Whether `self` and `other` are shares of the same owned buffer.
    pub fn shares_storage_with(&self, other: &Vector<'_, T>) -> bool {
        match (&self.storage, &other.storage) {
            (Storage::Owned(a), Storage::Owned(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    /// The elements as a slice, if they are contiguous.
    pub fn as_slice(&self) -> Option<&[T]> {
        match (self.is_contiguous(), self.len) {
            (false, _) => None,
            (true, 0) => Some(&[]),
            // SAFETY: step == 1, so the `len` elements are adjacent
            (true, len) => Some(unsafe { std::slice::from_raw_parts(self.ptr, len) }),
        }
    }

    /// The elements as a mutable slice, if they are contiguous and the handle is unique.
    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        match (self.is_contiguous() && self.is_unique(), self.len) {
            (false, _) => None,
            (true, 0) => Some(&mut []),
            // SAFETY: step == 1, so the `len` elements are adjacent
            (true, len) => Some(unsafe { std::slice::from_raw_parts_mut(self.ptr, len) }),
        }
    }

    /// Bounds-checked access.
    pub fn at(&self, idx: usize) -> Result<&T> {
        self.get(idx).ok_or(VectorError::OutOfRange {
            index: idx,
            len: self.len,
        })
    }

    /// Bounds-checked mutable access. Fails with [`VectorError::SharedStorage`] unless the handle
    /// is unique.
    pub fn at_mut(&mut self, idx: usize) -> Result<&mut T> {
        if !self.is_unique() {
            return Err(VectorError::SharedStorage);
        }
        let len = self.len;
        self.get_mut(idx)
            .ok_or(VectorError::OutOfRange { index: idx, len })
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&T> {
        // SAFETY: idx < len
        (idx < self.len).then(|| unsafe { self.get_unchecked(idx) })
    }

    /// `None` if `idx` is out of range or the handle is not unique.
    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        if idx < self.len && self.is_unique() {
            // SAFETY: idx < len
            Some(unsafe { self.get_unchecked_mut(idx) })
        } else {
            None
        }
    }

    /// # Safety
    ///
    /// `idx` must be less than `len()`.
    #[inline]
    pub unsafe fn get_unchecked(&self, idx: usize) -> &T {
        debug_assert!(idx < self.len);
        unsafe { &*self.ptr.add(idx * self.step) }
    }

    /// # Safety
    ///
    /// `idx` must be less than `len()`, and no reference to the element obtained through another
    /// handle sharing the storage may be alive while the returned one is.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, idx: usize) -> &mut T {
        debug_assert!(idx < self.len);
        unsafe { &mut *self.ptr.add(idx * self.step) }
    }

    /// Stores `value` at `idx` through a possibly shared handle, returning the previous element.
    /// The write is visible through every handle sharing the storage.
    ///
    /// # Safety
    ///
    /// No reference to element `idx` obtained through any handle sharing this storage may be alive
    /// during the call.
    pub unsafe fn replace_shared(&self, idx: usize, value: T) -> Result<T> {
        if idx >= self.len {
            return Err(VectorError::OutOfRange {
                index: idx,
                len: self.len,
            });
        }
        // SAFETY: idx < len, and the caller guarantees that nothing borrows the slot
        Ok(unsafe { ptr::replace(self.ptr.add(idx * self.step), value) })
    }

    /// Copies the elements into fresh, contiguous storage from this vector's resource (the default
    /// resource if it has none).
    pub fn deep_clone(&self) -> Result<Vector<'static, T>>
    where
        T: Clone,
    {
        let resource = self.resource().cloned().unwrap_or_else(default_resource);
        self.deep_clone_in(resource)
    }

    /// Copies the elements into fresh, contiguous storage from `resource`.
    pub fn deep_clone_in(&self, resource: ResourceRef) -> Result<Vector<'static, T>>
    where
        T: Clone,
    {
        debug!(
            "deep clone of {} elements (step {}) into '{}'",
            self.len,
            self.step,
            resource.name()
        );
        Vector::from_exact_iter_in(self.len, resource, self.iter().cloned())
    }

    /// Exchanges the contents of two vectors without touching their storage.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other)
    }

    /// Copies the elements into a `nalgebra` column vector.
    pub fn to_dvector(&self) -> nalgebra::DVector<T>
    where
        T: Scalar,
    {
        nalgebra::DVector::from_iterator(self.len, self.iter().cloned())
    }

    /// A `nalgebra` view over the same elements, honouring the stride.
    pub fn as_nalgebra_view(&self) -> nalgebra::MatrixView<'_, T, Dyn, Const<1>, Dyn, Dyn>
    where
        T: Scalar,
    {
        let extent = if self.len == 0 {
            0
        } else {
            (self.len - 1) * self.step + 1
        };
        let data: &[T] = if extent == 0 {
            &[]
        } else {
            // SAFETY: the last element sits at offset extent - 1
            unsafe { std::slice::from_raw_parts(self.ptr, extent) }
        };
        nalgebra::MatrixView::from_slice_with_strides_generic(
            data,
            Dyn(self.len),
            Const::<1>,
            Dyn(self.step),
            Dyn(extent.max(1)),
        )
    }
}

impl<T> Vector<'static, T> {
    /// Copies a `nalgebra` vector into fresh storage from the default resource.
    pub fn from_nalgebra<S>(v: &nalgebra::Matrix<T, Dyn, Const<1>, S>) -> Result<Self>
    where
        T: Scalar,
        S: nalgebra::RawStorage<T, Dyn, Const<1>>,
    {
        Self::from_exact_iter_in(v.nrows(), default_resource(), v.iter().cloned())
    }
}

impl<T> Default for Vector<'static, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for Vector<'_, T> {
    /// Shares the storage; see [`Vector::deep_clone`] for a copy of the elements.
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            len: self.len,
            step: self.step,
            storage: self.storage.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        // Take the new share before the old one is released, so `v.clone_from(&v)` keeps the
        // buffer alive.
        let storage = source.storage.clone();
        self.ptr = source.ptr;
        self.len = source.len;
        self.step = source.step;
        self.storage = storage;
    }
}

impl<T> TryFrom<Vec<T>> for Vector<'static, T> {
    type Error = VectorError;

    fn try_from(v: Vec<T>) -> Result<Self> {
        Self::from_exact_iter_in(v.len(), default_resource(), v)
    }
}

impl<T: Clone> TryFrom<&[T]> for Vector<'static, T> {
    type Error = VectorError;

    fn try_from(values: &[T]) -> Result<Self> {
        Self::from_values(values)
    }
}

impl<T> Index<usize> for Vector<'_, T> {
    type Output = T;

    fn index(&self, idx: usize) -> &T {
        let len = self.len;
        self.get(idx)
            .unwrap_or_else(|| panic!("index {idx} is out of range for a vector of length {len}"))
    }
}

/// # Panics
///
/// If `idx` is out of range or the handle is not unique.
impl<T> IndexMut<usize> for Vector<'_, T> {
    fn index_mut(&mut self, idx: usize) -> &mut T {
        assert!(self.is_unique(), "mutable access to shared vector storage");
        let len = self.len;
        self.get_mut(idx)
            .unwrap_or_else(|| panic!("index {idx} is out of range for a vector of length {len}"))
    }
}

impl<'b, T: PartialEq> PartialEq<Vector<'b, T>> for Vector<'_, T> {
    fn eq(&self, other: &Vector<'b, T>) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl<T: Debug> Debug for Vector<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
