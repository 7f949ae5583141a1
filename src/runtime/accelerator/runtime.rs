//! Accelerator runtime implementation

use super::client::{AcceleratorAllocator, AcceleratorClient};
use super::device::AcceleratorDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::sync::OnceLock;

/// Accelerator memory runtime
///
/// The primitives here execute immediately; asynchrony comes from
/// submitting them to the device [`Queue`](super::Queue), which is what
/// [`memory`](crate::runtime::memory) does.
#[derive(Clone, Debug, Default)]
pub struct AcceleratorRuntime;

static DEFAULT_DEVICE: OnceLock<AcceleratorDevice> = OnceLock::new();

impl AcceleratorRuntime {
    /// Copy `size_bytes` from host memory into device memory
    pub fn copy_to_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &AcceleratorDevice,
    ) -> Result<()> {
        device.check_owns(dst, size_bytes)?;
        raw_copy(src, dst, size_bytes)
    }

    /// Copy `size_bytes` from device memory into host memory
    pub fn copy_from_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &AcceleratorDevice,
    ) -> Result<()> {
        device.check_owns(src, size_bytes)?;
        raw_copy(src, dst, size_bytes)
    }
}

fn raw_copy(src: u64, dst: u64, size_bytes: usize) -> Result<()> {
    if size_bytes == 0 {
        return Ok(());
    }
    if src == 0 || dst == 0 {
        return Err(Error::invalid_argument("ptr", "null pointer in copy"));
    }
    // SAFETY: both ranges were checked to be live allocations of at least size_bytes
    unsafe {
        std::ptr::copy(src as *const u8, dst as *mut u8, size_bytes);
    }
    Ok(())
}

impl Runtime for AcceleratorRuntime {
    type Device = AcceleratorDevice;
    type Client = AcceleratorClient;
    type Allocator = AcceleratorAllocator;

    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        device.reserve(size_bytes)
    }

    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device) {
        device.release(ptr, size_bytes)
    }

    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()> {
        device.check_owns(src, size_bytes)?;
        device.check_owns(dst, size_bytes)?;
        raw_copy(src, dst, size_bytes)
    }

    fn write_bytes(dst: u64, value: u8, size_bytes: usize, device: &Self::Device) -> Result<()> {
        if size_bytes == 0 {
            return Ok(());
        }
        device.check_owns(dst, size_bytes)?;
        // SAFETY: range checked against the device registry above
        unsafe {
            std::ptr::write_bytes(dst as *mut u8, value, size_bytes);
        }
        Ok(())
    }

    fn default_device() -> Self::Device {
        DEFAULT_DEVICE
            .get_or_init(|| AcceleratorDevice::new(0))
            .clone()
    }

    fn default_client(device: &Self::Device) -> Self::Client {
        AcceleratorClient::new(device.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accelerator_rejects_foreign_pointers() {
        let device = AcceleratorDevice::new(1);
        let host = vec![0u8; 32];
        let err = AcceleratorRuntime::write_bytes(host.as_ptr() as u64, 1, 32, &device);
        assert!(err.is_err());
    }

    #[test]
    fn test_accelerator_roundtrip() {
        let device = AcceleratorDevice::new(2);
        let ptr = AcceleratorRuntime::allocate(8, &device).unwrap();

        let src = [1u8, 2, 3, 4, 5, 6, 7, 8];
        AcceleratorRuntime::copy_to_device(src.as_ptr() as u64, ptr, 8, &device).unwrap();
        let mut dst = [0u8; 8];
        AcceleratorRuntime::copy_from_device(ptr, dst.as_mut_ptr() as u64, 8, &device).unwrap();
        assert_eq!(src, dst);

        AcceleratorRuntime::deallocate(ptr, 8, &device);
    }

    #[test]
    fn test_default_device_is_shared() {
        let a = AcceleratorRuntime::default_device();
        let b = AcceleratorRuntime::default_device();
        assert_eq!(a, b);
    }
}
