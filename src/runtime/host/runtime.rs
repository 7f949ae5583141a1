//! Host runtime implementation

use super::client::{HostAllocator, HostClient};
use super::device::HostDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};
use std::sync::OnceLock;

/// Alignment of every allocation (AVX-512 width)
const ALIGN: usize = 64;

/// Host memory runtime
///
/// This is the default runtime that works on any platform.
/// Memory is allocated on the heap using the system allocator.
#[derive(Clone, Debug, Default)]
pub struct HostRuntime;

static HOST_CLIENT: OnceLock<HostClient> = OnceLock::new();

/// Allocate `size_bytes` of zeroed, 64-byte aligned heap memory
///
/// Zero-sized requests return the null pointer; they are never dereferenced.
pub(crate) fn aligned_alloc(size_bytes: usize, domain: &str) -> Result<u64> {
    if size_bytes == 0 {
        return Ok(0);
    }

    let layout = AllocLayout::from_size_align(size_bytes, ALIGN).map_err(|_| {
        Error::OutOfMemory {
            size: size_bytes,
            domain: domain.to_string(),
        }
    })?;

    // SAFETY: layout has non-zero size
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        tracing::warn!(size_bytes, domain, "allocation failed");
        return Err(Error::OutOfMemory {
            size: size_bytes,
            domain: domain.to_string(),
        });
    }

    Ok(ptr as u64)
}

/// Release memory obtained from [`aligned_alloc`]
pub(crate) fn aligned_dealloc(ptr: u64, size_bytes: usize) {
    if ptr == 0 || size_bytes == 0 {
        return;
    }

    if let Ok(layout) = AllocLayout::from_size_align(size_bytes, ALIGN) {
        // SAFETY: ptr was returned by aligned_alloc with this exact layout
        unsafe {
            dealloc(ptr as *mut u8, layout);
        }
    }
}

impl Runtime for HostRuntime {
    type Device = HostDevice;
    type Client = HostClient;
    type Allocator = HostAllocator;

    fn allocate(size_bytes: usize, _device: &Self::Device) -> Result<u64> {
        aligned_alloc(size_bytes, "host")
    }

    fn deallocate(ptr: u64, size_bytes: usize, _device: &Self::Device) {
        aligned_dealloc(ptr, size_bytes)
    }

    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        _device: &Self::Device,
    ) -> Result<()> {
        if size_bytes == 0 {
            return Ok(());
        }
        if src == 0 || dst == 0 {
            return Err(Error::invalid_argument("ptr", "null pointer in copy"));
        }

        // SAFETY: callers pass pointers to live buffers of at least size_bytes.
        // `copy` (not `copy_nonoverlapping`) in case src and dst overlap.
        unsafe {
            std::ptr::copy(src as *const u8, dst as *mut u8, size_bytes);
        }
        Ok(())
    }

    fn write_bytes(dst: u64, value: u8, size_bytes: usize, _device: &Self::Device) -> Result<()> {
        if size_bytes == 0 {
            return Ok(());
        }
        if dst == 0 {
            return Err(Error::invalid_argument("ptr", "null pointer in memset"));
        }

        // SAFETY: callers pass a pointer to a live buffer of at least size_bytes
        unsafe {
            std::ptr::write_bytes(dst as *mut u8, value, size_bytes);
        }
        Ok(())
    }

    fn default_device() -> Self::Device {
        HostDevice::new()
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        HOST_CLIENT
            .get_or_init(|| HostClient::new(device.clone()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Allocator, RuntimeClient};

    #[test]
    fn test_host_allocate_is_zeroed_and_aligned() {
        let device = HostRuntime::default_device();
        let ptr = HostRuntime::allocate(256, &device).unwrap();
        assert_eq!(ptr % ALIGN as u64, 0);

        let bytes = unsafe { std::slice::from_raw_parts(ptr as *const u8, 256) };
        assert!(bytes.iter().all(|&b| b == 0));
        HostRuntime::deallocate(ptr, 256, &device);
    }

    #[test]
    fn test_host_zero_sized_allocation() {
        let device = HostRuntime::default_device();
        assert_eq!(HostRuntime::allocate(0, &device).unwrap(), 0);
        HostRuntime::deallocate(0, 0, &device);
    }

    #[test]
    fn test_host_oversized_allocation_fails() {
        let device = HostRuntime::default_device();
        let err = HostRuntime::allocate(usize::MAX - 8, &device).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { .. }));
    }

    #[test]
    fn test_host_memset_and_copy() {
        let device = HostRuntime::default_device();
        let a = HostRuntime::allocate(16, &device).unwrap();
        let b = HostRuntime::allocate(16, &device).unwrap();

        HostRuntime::write_bytes(a, 7, 16, &device).unwrap();
        HostRuntime::copy_within_device(a, b, 16, &device).unwrap();

        let bytes = unsafe { std::slice::from_raw_parts(b as *const u8, 16) };
        assert!(bytes.iter().all(|&v| v == 7));

        HostRuntime::deallocate(a, 16, &device);
        HostRuntime::deallocate(b, 16, &device);
    }

    #[test]
    fn test_host_client_allocator() {
        let device = HostRuntime::default_device();
        let client = HostClient::new(device);
        assert!(client.synchronize().is_ok());

        let ptr = client.allocator().allocate(64).unwrap();
        assert_eq!(client.allocator().allocated_bytes(), 64);
        client.allocator().deallocate(ptr, 64);
        assert_eq!(client.allocator().allocated_bytes(), 0);
    }

    #[test]
    fn test_default_clients_share_counter() {
        let device = HostRuntime::default_device();
        let a = HostRuntime::default_client(&device);
        let b = HostRuntime::default_client(&device);

        // other tests allocate through the shared client concurrently
        let ptr = a.allocator().allocate(4096).unwrap();
        assert!(b.allocator().allocated_bytes() >= 4096);
        b.allocator().deallocate(ptr, 4096);
    }
}
