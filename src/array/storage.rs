//! Storage: domain memory management with Arc-based sharing

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::MemoryDomain;
use parking_lot::Mutex;
use std::sync::Arc;

type Deleter = Box<dyn FnOnce() + Send + 'static>;

/// How a storage relates to the memory it references
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Allocated by this crate; freed through the domain allocator
    Allocated,
    /// Foreign memory; a caller-supplied deleter runs once on release
    CustomDeleter,
    /// Foreign memory; the caller keeps it alive and frees it
    Borrowed,
}

/// Memory for buffer data in one domain
///
/// Storage wraps domain memory with reference counting, enabling zero-copy
/// views that share the underlying allocation.
///
/// A borrowed storage never frees its memory. Keeping that memory alive for
/// as long as any handle exists is the caller's documented responsibility;
/// it is not enforced.
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    /// Raw pointer (accelerator address or host ptr cast to u64)
    ptr: u64,
    size_bytes: usize,
    domain: MemoryDomain,
    ownership: Ownership,
    deleter: Mutex<Option<Deleter>>,
}

impl Storage {
    fn from_inner(
        ptr: u64,
        size_bytes: usize,
        domain: MemoryDomain,
        ownership: Ownership,
        deleter: Option<Deleter>,
    ) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                ptr,
                size_bytes,
                domain,
                ownership,
                deleter: Mutex::new(deleter),
            }),
        }
    }

    /// Allocate `size_bytes` of zeroed memory in `domain`
    pub fn allocate(size_bytes: usize, domain: &MemoryDomain) -> Result<Self> {
        let ptr = domain.allocate(size_bytes)?;
        Ok(Self::from_inner(
            ptr,
            size_bytes,
            domain.clone(),
            Ownership::Allocated,
            None,
        ))
    }

    /// Adopt a vector without copying it
    ///
    /// The vector's allocation is released when the last handle drops.
    pub fn from_vec<T: Element>(data: Vec<T>) -> Self {
        let mut data = std::mem::ManuallyDrop::new(data);
        let (len, capacity) = (data.len(), data.capacity());
        let size_bytes = len * std::mem::size_of::<T>();
        let ptr = data.as_mut_ptr() as u64;

        let deleter: Deleter = Box::new(move || {
            // SAFETY: rebuilds the vector forgotten above, exactly once
            drop(unsafe { Vec::from_raw_parts(ptr as *mut T, len, capacity) });
        });

        Self::from_inner(
            ptr,
            size_bytes,
            MemoryDomain::Host,
            Ownership::CustomDeleter,
            Some(deleter),
        )
    }

    /// Wrap existing memory without copying
    ///
    /// With a deleter the storage takes ownership: the deleter runs exactly
    /// once, when the last handle drops. Without one the memory is borrowed.
    ///
    /// Accelerator pointers must belong to the given device context.
    ///
    /// # Safety
    /// - `ptr` must address at least `size_bytes` of valid memory in `domain`
    /// - borrowed memory must remain valid for the lifetime of every handle
    pub unsafe fn from_raw_parts(
        ptr: u64,
        size_bytes: usize,
        domain: &MemoryDomain,
        deleter: Option<Box<dyn FnOnce() + Send + 'static>>,
    ) -> Result<Self> {
        domain.check_owns(ptr, size_bytes)?;
        let ownership = if deleter.is_some() {
            Ownership::CustomDeleter
        } else {
            Ownership::Borrowed
        };
        Ok(Self::from_inner(
            ptr,
            size_bytes,
            domain.clone(),
            ownership,
            deleter,
        ))
    }

    /// Get the raw pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.size_bytes
    }

    /// Get the memory domain
    #[inline]
    pub fn domain(&self) -> &MemoryDomain {
        &self.inner.domain
    }

    /// Get the ownership policy
    #[inline]
    pub fn ownership(&self) -> Ownership {
        self.inner.ownership
    }

    /// Get the reference count
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Check if this is the only reference
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Check whether two handles share one allocation
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fail with a domain-appropriate error if `[offset, offset + len)` is out of range
    pub(crate) fn check_range(&self, byte_offset: usize, size_bytes: usize) -> Result<()> {
        match byte_offset.checked_add(size_bytes) {
            Some(end) if end <= self.inner.size_bytes => Ok(()),
            _ => Err(Error::invalid_argument(
                "range",
                format!(
                    "bytes {byte_offset}..{} exceed storage of {} bytes",
                    byte_offset.saturating_add(size_bytes),
                    self.inner.size_bytes
                ),
            )),
        }
    }
}

impl Clone for Storage {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        match self.ownership {
            Ownership::Allocated => self.domain.deallocate(self.ptr, self.size_bytes),
            Ownership::CustomDeleter => {
                if let Some(deleter) = self.deleter.get_mut().take() {
                    deleter();
                }
            }
            Ownership::Borrowed => {}
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("size_bytes", &self.inner.size_bytes)
            .field("domain", &self.inner.domain)
            .field("ownership", &self.inner.ownership)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_deleter_runs_once_after_last_handle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let data = vec![1u8, 2, 3, 4];

        let counter = Arc::clone(&calls);
        let storage = unsafe {
            Storage::from_raw_parts(
                data.as_ptr() as u64,
                data.len(),
                &MemoryDomain::Host,
                Some(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })),
            )
        }
        .unwrap();
        assert_eq!(storage.ownership(), Ownership::CustomDeleter);

        let shared = storage.clone();
        assert_eq!(storage.ref_count(), 2);
        drop(storage);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(shared);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_borrowed_storage_never_frees() {
        let data = vec![0u64; 4];
        let storage = unsafe {
            Storage::from_raw_parts(data.as_ptr() as u64, 32, &MemoryDomain::Host, None)
        }
        .unwrap();
        assert_eq!(storage.ownership(), Ownership::Borrowed);
        drop(storage);
        assert_eq!(data, vec![0u64; 4]);
    }

    #[test]
    fn test_from_vec_is_zero_copy() {
        let data = vec![1.5f64, 2.5];
        let ptr = data.as_ptr() as u64;
        let storage = Storage::from_vec(data);
        assert_eq!(storage.ptr(), ptr);
        assert_eq!(storage.size_in_bytes(), 16);
    }

    #[test]
    fn test_null_host_pointer_rejected() {
        let result = unsafe { Storage::from_raw_parts(0, 8, &MemoryDomain::Host, None) };
        assert!(result.is_err());
    }

    #[test]
    fn test_check_range() {
        let storage = Storage::allocate(64, &MemoryDomain::Host).unwrap();
        assert!(storage.check_range(0, 64).is_ok());
        assert!(storage.check_range(32, 33).is_err());
        assert!(storage.check_range(usize::MAX, 2).is_err());
    }
}
