//! Memory allocator traits and default implementation
//!
//! The Allocator trait gives algorithms a way to materialize intermediate
//! buffers without knowing which domain they live in.
//! [`MemoryDomain::allocate`](crate::runtime::MemoryDomain::allocate) goes
//! through the domain client's allocator.

use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory allocator trait for runtime backends
pub trait Allocator: Clone + Send + Sync {
    /// Allocate memory of given size
    ///
    /// Returns a pointer (u64) that can be used for operations, or
    /// `Err(OutOfMemory)` when the request cannot be satisfied.
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Deallocate memory
    fn deallocate(&self, ptr: u64, size_bytes: usize);

    /// Get the total bytes currently allocated through this allocator
    fn allocated_bytes(&self) -> usize {
        0 // Default: tracking not supported
    }
}

/// Default allocator that delegates to Runtime methods
///
/// Tracks the number of live bytes handed out through it.
#[derive(Clone, Debug)]
pub struct DefaultAllocator<D> {
    device: D,
    allocate_fn: fn(usize, &D) -> Result<u64>,
    deallocate_fn: fn(u64, usize, &D),
    live_bytes: Arc<AtomicUsize>,
}

impl<D: Clone + Send + Sync> DefaultAllocator<D> {
    /// Create a new default allocator
    pub fn new(
        device: D,
        allocate_fn: fn(usize, &D) -> Result<u64>,
        deallocate_fn: fn(u64, usize, &D),
    ) -> Self {
        Self::with_counter(device, allocate_fn, deallocate_fn, Arc::default())
    }

    /// Create an allocator that reports into an existing live-byte counter
    ///
    /// Allocators built over the same counter see each other's allocations.
    pub fn with_counter(
        device: D,
        allocate_fn: fn(usize, &D) -> Result<u64>,
        deallocate_fn: fn(u64, usize, &D),
        live_bytes: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            device,
            allocate_fn,
            deallocate_fn,
            live_bytes,
        }
    }

    /// Get the device this allocator is associated with
    pub fn device(&self) -> &D {
        &self.device
    }
}

impl<D: Clone + Send + Sync> Allocator for DefaultAllocator<D> {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        let ptr = (self.allocate_fn)(size_bytes, &self.device)?;
        self.live_bytes.fetch_add(size_bytes, Ordering::Relaxed);
        Ok(ptr)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        (self.deallocate_fn)(ptr, size_bytes, &self.device);
        self.live_bytes.fetch_sub(size_bytes, Ordering::Relaxed);
    }

    fn allocated_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }
}
