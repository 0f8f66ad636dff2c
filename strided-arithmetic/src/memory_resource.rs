//! Memory resources backing owned [`Vector`](crate::linear_algebra::Vector) storage.
//!
//! A [`MemoryResource`] hands out raw blocks for a [`Layout`] and takes them back. Vectors hold a
//! [`ResourceRef`] to the resource their buffer came from, so a resource always outlives the buffers
//! it allocated. Several implementations are provided:
//!
//! - [`HeapResource`]: the global allocator (the initial per-thread default)
//! - [`NullResource`]: fails every request, useful to exercise allocation failures
//! - [`PoolResource`]: recycles freed blocks through per-layout free lists
//! - [`ArenaResource`]: fixed-capacity bump arena, memory is reclaimed in bulk
//! - [`TrackingResource`]: wraps another resource and records [`AllocStats`]

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Debug;
use std::ptr::NonNull;
use std::rc::Rc;

use log::{debug, trace};

use crate::error::AllocError;

/// Shared, type-erased handle to a memory resource.
pub type ResourceRef = Rc<dyn MemoryResource>;

pub trait MemoryResource: Debug {
    /// Allocate a block for `layout`. Zero-sized requests return a dangling, well-aligned pointer.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Return a block to this resource.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this resource (or one it `is_equal` to) with
    /// the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Whether memory allocated by `other` can be returned to `self`. Must be symmetric.
    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        std::ptr::addr_eq(self as *const Self, other as *const dyn MemoryResource)
    }

    /// Whether blocks come straight from the global allocator, so that any two such resources
    /// can free each other's memory.
    fn is_global_allocator(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

#[inline]
fn dangling(layout: Layout) -> NonNull<u8> {
    // SAFETY: alignments are non-zero powers of two
    unsafe { NonNull::new_unchecked(layout.align() as *mut u8) }
}

#[inline]
const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Allocation counters kept by [`TrackingResource`] and [`PoolResource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocStats {
    pub bytes_in_use: usize,
    pub allocation_count: usize,
    pub deallocation_count: usize,
    pub peak_bytes: usize,
    pub failed_allocations: usize,
}

impl AllocStats {
    pub fn record_alloc(&mut self, size: usize) {
        self.bytes_in_use += size;
        self.allocation_count += 1;
        self.peak_bytes = self.peak_bytes.max(self.bytes_in_use);
    }

    pub fn record_dealloc(&mut self, size: usize) {
        self.bytes_in_use = self.bytes_in_use.saturating_sub(size);
        self.deallocation_count += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed_allocations += 1;
    }

    /// Number of allocations that have not been returned yet.
    pub fn live_allocations(&self) -> usize {
        self.allocation_count - self.deallocation_count
    }
}

/// The global allocator. Memory is zero-initialized.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapResource;

impl MemoryResource for HeapResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        // SAFETY: layout has non-zero size
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or(AllocError::OutOfMemory {
            requested: layout.size(),
        })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            // SAFETY: guaranteed by the caller
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        other.is_global_allocator()
    }

    fn is_global_allocator(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "heap"
    }
}

/// A resource that never produces memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResource;

impl MemoryResource for NullResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Err(AllocError::OutOfMemory {
            requested: layout.size(),
        })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Unsynchronized pool: freed blocks are kept in a free list per layout and handed out again for
/// requests with the same layout. Pooled blocks go back to the heap when the pool is dropped.
#[derive(Debug, Default)]
pub struct PoolResource {
    free_lists: RefCell<HashMap<Layout, Vec<NonNull<u8>>>>,
    stats: Cell<AllocStats>,
}

impl PoolResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    /// Number of blocks currently parked in the free lists.
    pub fn pooled_blocks(&self) -> usize {
        self.free_lists.borrow().values().map(Vec::len).sum()
    }

    fn update_stats(&self, f: impl FnOnce(&mut AllocStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl MemoryResource for PoolResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        let recycled = self
            .free_lists
            .borrow_mut()
            .get_mut(&layout)
            .and_then(Vec::pop);
        let ptr = match recycled {
            Some(ptr) => {
                trace!("pool: recycling a block of {} bytes", layout.size());
                ptr
            }
            None => match HeapResource.allocate(layout) {
                Ok(ptr) => ptr,
                Err(e) => {
                    self.update_stats(AllocStats::record_failure);
                    return Err(e);
                }
            },
        };
        self.update_stats(|s| s.record_alloc(layout.size()));
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        self.update_stats(|s| s.record_dealloc(layout.size()));
        self.free_lists
            .borrow_mut()
            .entry(layout)
            .or_default()
            .push(ptr);
    }

    fn name(&self) -> &'static str {
        "pool"
    }
}

impl Drop for PoolResource {
    fn drop(&mut self) {
        for (layout, blocks) in self.free_lists.get_mut().drain() {
            for ptr in blocks {
                // SAFETY: every pooled block came from HeapResource with this layout
                unsafe { HeapResource.deallocate(ptr, layout) }
            }
        }
    }
}

/// Fixed-capacity bump arena. `deallocate` only tracks liveness; memory is reclaimed by
/// [`ArenaResource::reset`] or when the arena is dropped.
#[derive(Debug)]
pub struct ArenaResource {
    base: NonNull<u8>,
    capacity: usize,
    cursor: Cell<usize>,
    live: Cell<usize>,
}

impl ArenaResource {
    const BASE_ALIGN: usize = 64;

    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        let base = HeapResource.allocate(Self::base_layout(capacity)?)?;
        Ok(Self {
            base,
            capacity,
            cursor: Cell::new(0),
            live: Cell::new(0),
        })
    }

    fn base_layout(capacity: usize) -> Result<Layout, AllocError> {
        Ok(Layout::from_size_align(capacity, Self::BASE_ALIGN)?)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes consumed so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    pub fn live_allocations(&self) -> usize {
        self.live.get()
    }

    /// Rewind the arena. Refused (returns `false`) while allocations are still live.
    pub fn reset(&self) -> bool {
        if self.live.get() != 0 {
            return false;
        }
        debug!("arena: reset after using {} of {} bytes", self.used(), self.capacity);
        self.cursor.set(0);
        true
    }
}

impl MemoryResource for ArenaResource {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling(layout));
        }
        let base = self.base.as_ptr() as usize;
        let start = align_up(base + self.cursor.get(), layout.align()) - base;
        let end = start
            .checked_add(layout.size())
            .filter(|end| *end <= self.capacity)
            .ok_or(AllocError::ArenaExhausted {
                current: self.cursor.get(),
                capacity: self.capacity,
            })?;
        self.cursor.set(end);
        self.live.set(self.live.get() + 1);
        // SAFETY: start + size <= capacity, so the block lies inside the arena
        Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(start)) })
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, layout: Layout) {
        if layout.size() != 0 {
            self.live.set(self.live.get().saturating_sub(1));
        }
    }

    fn name(&self) -> &'static str {
        "arena"
    }
}

impl Drop for ArenaResource {
    fn drop(&mut self) {
        if let Ok(layout) = Self::base_layout(self.capacity) {
            // SAFETY: base was allocated by HeapResource with this layout in `new`
            unsafe { HeapResource.deallocate(self.base, layout) }
        }
    }
}

/// Wraps a resource and records every request in [`AllocStats`].
#[derive(Debug, Default)]
pub struct TrackingResource<R: MemoryResource> {
    inner: R,
    stats: Cell<AllocStats>,
}

impl<R: MemoryResource> TrackingResource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            stats: Cell::new(AllocStats::default()),
        }
    }

    pub fn stats(&self) -> AllocStats {
        self.stats.get()
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn update_stats(&self, f: impl FnOnce(&mut AllocStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl<R: MemoryResource> MemoryResource for TrackingResource<R> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let result = self.inner.allocate(layout);
        match &result {
            Ok(_) => self.update_stats(|s| s.record_alloc(layout.size())),
            Err(_) => self.update_stats(AllocStats::record_failure),
        }
        result
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.update_stats(|s| s.record_dealloc(layout.size()));
        // SAFETY: forwarded from the caller
        unsafe { self.inner.deallocate(ptr, layout) }
    }

    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        if self.is_global_allocator() {
            other.is_global_allocator()
        } else {
            std::ptr::addr_eq(self as *const Self, other as *const dyn MemoryResource)
        }
    }

    fn is_global_allocator(&self) -> bool {
        self.inner.is_global_allocator()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

thread_local! {
    static DEFAULT_RESOURCE: RefCell<ResourceRef> = RefCell::new(Rc::new(HeapResource));
}

/// The resource used by constructors that do not take one explicitly (per thread).
pub fn default_resource() -> ResourceRef {
    DEFAULT_RESOURCE.with(|r| r.borrow().clone())
}

/// Replace this thread's default resource, returning the previous one.
pub fn set_default_resource(resource: ResourceRef) -> ResourceRef {
    debug!("default memory resource set to '{}'", resource.name());
    DEFAULT_RESOURCE.with(|r| r.replace(resource))
}

pub fn heap_resource() -> ResourceRef {
    Rc::new(HeapResource)
}

pub fn null_resource() -> ResourceRef {
    Rc::new(NullResource)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn test_heap_is_zeroed() {
        let heap = HeapResource;
        let l = layout(64);
        let ptr = heap.allocate(l).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(bytes.iter().all(|b| *b == 0));
        unsafe { heap.deallocate(ptr, l) };
    }

    #[test]
    fn test_zero_sized_requests() {
        let l = Layout::from_size_align(0, 16).unwrap();
        for r in [heap_resource(), Rc::new(PoolResource::new()) as ResourceRef] {
            let ptr = r.allocate(l).unwrap();
            assert_eq!(ptr.as_ptr() as usize % 16, 0);
            unsafe { r.deallocate(ptr, l) };
        }
    }

    #[test]
    fn test_null_resource_fails() {
        let err = NullResource.allocate(layout(12)).unwrap_err();
        assert_eq!(err, AllocError::OutOfMemory { requested: 12 });
    }

    #[test]
    fn test_is_equal() {
        let a = heap_resource();
        let b = heap_resource();
        assert!(a.is_equal(b.as_ref()));

        let p1 = PoolResource::new();
        let p2 = PoolResource::new();
        assert!(p1.is_equal(&p1));
        assert!(!p1.is_equal(&p2));
        assert!(!p1.is_equal(a.as_ref()));
    }

    #[test]
    fn test_is_equal_is_symmetric() {
        let heap = HeapResource;
        let tracked_heap = TrackingResource::new(HeapResource);
        let tracked_pool = TrackingResource::new(PoolResource::new());
        let pool = PoolResource::new();
        let resources: [&dyn MemoryResource; 5] =
            [&heap, &tracked_heap, &tracked_pool, &pool, &NullResource];
        for a in resources {
            for b in resources {
                assert_eq!(a.is_equal(b), b.is_equal(a), "{a:?} vs {b:?}");
            }
            assert!(a.is_equal(a));
        }
        assert!(heap.is_equal(&tracked_heap));
        assert!(!tracked_pool.is_equal(&pool));
        assert!(!heap.is_equal(&NullResource));
    }

    #[test]
    fn test_pool_recycles_blocks() {
        let pool = PoolResource::new();
        let l = layout(32);
        let first = pool.allocate(l).unwrap();
        unsafe { pool.deallocate(first, l) };
        assert_eq!(pool.pooled_blocks(), 1);

        let second = pool.allocate(l).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.pooled_blocks(), 0);

        // A different layout does not reuse the parked block
        let other = pool.allocate(layout(48)).unwrap();
        assert_ne!(other, second);

        unsafe {
            pool.deallocate(second, l);
            pool.deallocate(other, layout(48));
        }
        let stats = pool.stats();
        assert_eq!(stats.allocation_count, 3);
        assert_eq!(stats.deallocation_count, 3);
        assert_eq!(stats.bytes_in_use, 0);
    }

    #[test]
    fn test_arena_exhaustion_and_reset() {
        let arena = ArenaResource::new(64).unwrap();
        let a = arena.allocate(layout(40)).unwrap();
        assert_eq!(a.as_ptr() as usize % 8, 0);
        assert_eq!(arena.used(), 40);

        let err = arena.allocate(layout(40)).unwrap_err();
        assert_eq!(
            err,
            AllocError::ArenaExhausted {
                current: 40,
                capacity: 64
            }
        );

        assert!(!arena.reset());
        unsafe { arena.deallocate(a, layout(40)) };
        assert_eq!(arena.live_allocations(), 0);
        assert!(arena.reset());
        assert_eq!(arena.used(), 0);
        assert!(arena.allocate(layout(64)).is_ok());
    }

    #[test]
    fn test_arena_alignment_padding() {
        let arena = ArenaResource::new(256).unwrap();
        let _ = arena.allocate(Layout::from_size_align(3, 1).unwrap()).unwrap();
        let p = arena
            .allocate(Layout::from_size_align(16, 32).unwrap())
            .unwrap();
        assert_eq!(p.as_ptr() as usize % 32, 0);
        assert_eq!(arena.used(), 48);
    }

    #[test]
    fn test_tracking_resource() {
        let tracking = TrackingResource::new(HeapResource);
        let l = layout(24);
        let p = tracking.allocate(l).unwrap();
        assert_eq!(tracking.stats().bytes_in_use, 24);
        unsafe { tracking.deallocate(p, l) };

        let failing = TrackingResource::new(NullResource);
        assert!(failing.allocate(l).is_err());

        assert_eq!(tracking.stats().allocation_count, 1);
        assert_eq!(tracking.stats().deallocation_count, 1);
        assert_eq!(tracking.stats().peak_bytes, 24);
        assert_eq!(tracking.stats().live_allocations(), 0);
        assert_eq!(failing.stats().failed_allocations, 1);
        assert_eq!(failing.name(), "null");
    }

    #[test]
    fn test_default_resource_is_per_thread_and_replaceable() {
        assert_eq!(default_resource().name(), "heap");
        let pool: ResourceRef = Rc::new(PoolResource::new());
        let previous = set_default_resource(pool.clone());
        assert_eq!(previous.name(), "heap");
        assert!(Rc::ptr_eq(&default_resource(), &pool));

        std::thread::spawn(|| assert_eq!(default_resource().name(), "heap"))
            .join()
            .unwrap();

        set_default_resource(previous);
        assert_eq!(default_resource().name(), "heap");
    }
}
