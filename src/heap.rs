//! A heap allocator for Cortex-M with low-water-mark tracking.
//!
//! Wraps `linked_list_allocator` behind a critical section and remembers the
//! smallest amount of free memory ever observed, so the idle hook can report
//! how close the harness has come to running out.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::RefCell;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicUsize, Ordering};

use linked_list_allocator::Heap;

use crate::sync::{self, Mutex};

/// Point-in-time heap figures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapSample {
    pub free_bytes: usize,
    pub min_ever_free_bytes: usize,
}

/// Read-only heap telemetry.
pub trait HeapTelemetry {
    fn free_bytes(&self) -> usize;
    fn min_ever_free_bytes(&self) -> usize;

    fn sample(&self) -> HeapSample {
        HeapSample {
            free_bytes: self.free_bytes(),
            min_ever_free_bytes: self.min_ever_free_bytes(),
        }
    }
}

pub struct TrackedHeap {
    heap: Mutex<RefCell<Heap>>,
    min_free: AtomicUsize,
}

impl TrackedHeap {
    /// Create a new UNINITIALIZED heap allocator.
    ///
    /// You must initialize this heap using [`init`](Self::init) before using
    /// the allocator.
    pub const fn empty() -> Self {
        Self {
            heap: Mutex::new(RefCell::new(Heap::empty())),
            min_free: AtomicUsize::new(0),
        }
    }

    /// Initializes the heap.
    ///
    /// # Safety
    ///
    /// - This function must be called exactly ONCE, before the first
    ///   allocation.
    /// - `start` must point to `size` bytes of otherwise unused memory that
    ///   stay valid for the rest of the program.
    /// - `size > 0`
    pub unsafe fn init(&self, start: *mut u8, size: usize) {
        sync::critical_section(|cs| {
            let mut heap = self.heap.borrow_ref_mut(cs);
            heap.init(start, size);
            self.min_free.store(heap.free(), Ordering::Relaxed);
        });
    }

    /// Returns an estimate of the amount of bytes in use.
    pub fn used(&self) -> usize {
        sync::critical_section(|cs| self.heap.borrow_ref(cs).used())
    }

    /// Returns an estimate of the amount of bytes available.
    pub fn free(&self) -> usize {
        sync::critical_section(|cs| self.heap.borrow_ref(cs).free())
    }

    fn note_free(&self, free: usize) {
        self.min_free.fetch_min(free, Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for TrackedHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        sync::critical_section(|cs| {
            let mut heap = self.heap.borrow_ref_mut(cs);
            let block = heap
                .allocate_first_fit(layout)
                .ok()
                .map_or(ptr::null_mut(), |allocation| allocation.as_ptr());
            self.note_free(heap.free());
            block
        })
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        sync::critical_section(|cs| {
            self.heap
                .borrow_ref_mut(cs)
                .deallocate(NonNull::new_unchecked(ptr), layout)
        });
    }
}

impl HeapTelemetry for TrackedHeap {
    fn free_bytes(&self) -> usize {
        self.free()
    }

    fn min_ever_free_bytes(&self) -> usize {
        self.min_free.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(16))]
    struct Arena([u8; 4096]);

    #[test]
    fn test_low_water_mark_survives_free() {
        let mut arena = Box::new(Arena([0; 4096]));
        let heap = TrackedHeap::empty();
        unsafe { heap.init(arena.0.as_mut_ptr(), arena.0.len()) };

        let start = heap.sample();
        assert_eq!(start.free_bytes, start.min_ever_free_bytes);
        assert_eq!(heap.used(), 0);

        let layout = Layout::from_size_align(1024, 8).unwrap();
        let block = unsafe { heap.alloc(layout) };
        assert!(!block.is_null());
        let busy = heap.sample();
        assert!(busy.free_bytes <= start.free_bytes - 1024);
        assert_eq!(busy.min_ever_free_bytes, busy.free_bytes);

        unsafe { heap.dealloc(block, layout) };
        let after = heap.sample();
        assert_eq!(after.free_bytes, start.free_bytes);
        assert_eq!(after.min_ever_free_bytes, busy.min_ever_free_bytes);
    }

    #[test]
    fn test_exhaustion_returns_null() {
        let mut arena = Box::new(Arena([0; 4096]));
        let heap = TrackedHeap::empty();
        unsafe { heap.init(arena.0.as_mut_ptr(), arena.0.len()) };

        let layout = Layout::from_size_align(8192, 8).unwrap();
        assert!(unsafe { heap.alloc(layout) }.is_null());
    }
}
