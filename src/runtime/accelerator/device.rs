//! Accelerator device implementation

use super::queue::Queue;
use crate::error::{Error, Result};
use crate::runtime::Device;
use crate::runtime::host::{aligned_alloc, aligned_dealloc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An accelerator memory context
///
/// Cloning is cheap and yields a handle to the same context: the same
/// allocation registry, memory budget and queue.
#[derive(Clone)]
pub struct AcceleratorDevice {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    id: usize,
    memory_limit: Option<usize>,
    used: AtomicUsize,
    /// Live bytes reported by this device's client allocators
    client_bytes: Arc<AtomicUsize>,
    /// Live allocations: base pointer -> size in bytes
    allocations: Mutex<BTreeMap<u64, usize>>,
    queue: Queue,
}

impl AcceleratorDevice {
    /// Create a device context without a memory budget
    pub fn new(id: usize) -> Self {
        Self::build(id, None)
    }

    /// Create a device context that refuses allocations beyond `limit_bytes`
    pub fn with_memory_limit(id: usize, limit_bytes: usize) -> Self {
        Self::build(id, Some(limit_bytes))
    }

    fn build(id: usize, memory_limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                id,
                memory_limit,
                used: AtomicUsize::new(0),
                client_bytes: Arc::default(),
                allocations: Mutex::new(BTreeMap::new()),
                queue: Queue::new(format!("dalcore-accel-{id}")),
            }),
        }
    }

    /// The in-order queue operations on this device are submitted to
    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    /// Bytes currently allocated on this device
    pub fn used_bytes(&self) -> usize {
        self.inner.used.load(Ordering::SeqCst)
    }

    pub(crate) fn client_bytes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.inner.client_bytes)
    }

    /// Memory budget, if any
    pub fn memory_limit(&self) -> Option<usize> {
        self.inner.memory_limit
    }

    /// Check whether `[ptr, ptr + size_bytes)` lies inside one live allocation
    pub fn contains(&self, ptr: u64, size_bytes: usize) -> bool {
        if size_bytes == 0 {
            return true;
        }
        let allocations = self.inner.allocations.lock();
        match allocations.range(..=ptr).next_back() {
            Some((&base, &len)) => ptr + size_bytes as u64 <= base + len as u64,
            None => false,
        }
    }

    /// Fail unless `[ptr, ptr + size_bytes)` belongs to this device
    pub(crate) fn check_owns(&self, ptr: u64, size_bytes: usize) -> Result<()> {
        if self.contains(ptr, size_bytes) {
            Ok(())
        } else {
            Err(Error::invalid_argument(
                "ptr",
                format!(
                    "0x{ptr:x}+{size_bytes} does not belong to accelerator {}",
                    self.inner.id
                ),
            ))
        }
    }

    /// Reserve and register `size_bytes` of device memory
    pub(crate) fn reserve(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let domain = self.name();
        if let Some(limit) = self.inner.memory_limit {
            let reserved = self
                .inner
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                    used.checked_add(size_bytes).filter(|&total| total <= limit)
                });
            if reserved.is_err() {
                tracing::warn!(size_bytes, limit, device = %domain, "device memory budget exceeded");
                return Err(Error::OutOfMemory {
                    size: size_bytes,
                    domain,
                });
            }
        } else {
            self.inner.used.fetch_add(size_bytes, Ordering::SeqCst);
        }

        let ptr = match aligned_alloc(size_bytes, &domain) {
            Ok(ptr) => ptr,
            Err(err) => {
                self.inner.used.fetch_sub(size_bytes, Ordering::SeqCst);
                return Err(err);
            }
        };
        self.inner.allocations.lock().insert(ptr, size_bytes);
        tracing::debug!(ptr = format_args!("0x{ptr:x}"), size_bytes, device = %domain, "device allocation");
        Ok(ptr)
    }

    /// Unregister and free an allocation made by [`Self::reserve`]
    pub(crate) fn release(&self, ptr: u64, size_bytes: usize) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }
        let removed = self.inner.allocations.lock().remove(&ptr);
        match removed {
            Some(len) => {
                aligned_dealloc(ptr, len);
                self.inner.used.fetch_sub(len, Ordering::SeqCst);
            }
            None => {
                tracing::warn!(ptr = format_args!("0x{ptr:x}"), "release of unknown device pointer")
            }
        }
    }
}

impl Device for AcceleratorDevice {
    fn id(&self) -> usize {
        self.inner.id
    }

    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn name(&self) -> String {
        format!("accelerator:{}", self.inner.id)
    }
}

impl PartialEq for AcceleratorDevice {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for AcceleratorDevice {}

impl std::fmt::Debug for AcceleratorDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceleratorDevice")
            .field("id", &self.inner.id)
            .field("used", &self.used_bytes())
            .field("limit", &self.inner.memory_limit)
            .finish()
    }
}
