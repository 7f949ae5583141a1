//! Domain-dispatching memory primitives
//!
//! `copy`, `memset` and `fill` are the only functions in the crate that
//! write raw memory. When either endpoint lives on an accelerator the
//! operation is submitted to that device's queue and the returned [`Event`]
//! must be waited on before the destination is used from another domain.
//! Host-only operations complete before returning.

use crate::array::{Array, Buffer};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::accelerator::{AcceleratorDevice, AcceleratorRuntime};
use crate::runtime::host::{HostDevice, HostRuntime};
use crate::runtime::{Allocator, Device, Event, Runtime, RuntimeClient};

/// Where a buffer's memory lives
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MemoryDomain {
    /// Host memory
    #[default]
    Host,
    /// Memory owned by an accelerator context
    Accelerator(AcceleratorDevice),
}

impl MemoryDomain {
    /// Returns true for host memory
    #[inline]
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }

    /// Returns true for accelerator memory
    #[inline]
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Self::Accelerator(_))
    }

    /// The accelerator context, if this is accelerator memory
    pub fn accelerator(&self) -> Option<&AcceleratorDevice> {
        match self {
            Self::Host => None,
            Self::Accelerator(device) => Some(device),
        }
    }

    /// Human-readable name
    pub fn name(&self) -> String {
        match self {
            Self::Host => HostDevice::new().name(),
            Self::Accelerator(device) => device.name(),
        }
    }

    /// Allocate zeroed memory in this domain
    ///
    /// Goes through the domain's client allocator, so the bytes show up in
    /// [`Self::allocated_bytes`] until they are freed.
    pub fn allocate(&self, size_bytes: usize) -> Result<u64> {
        match self {
            Self::Host => HostRuntime::default_client(&HostDevice::new())
                .allocator()
                .allocate(size_bytes),
            Self::Accelerator(device) => AcceleratorRuntime::default_client(device)
                .allocator()
                .allocate(size_bytes),
        }
    }

    /// Free memory obtained from [`Self::allocate`]
    pub(crate) fn deallocate(&self, ptr: u64, size_bytes: usize) {
        match self {
            Self::Host => HostRuntime::default_client(&HostDevice::new())
                .allocator()
                .deallocate(ptr, size_bytes),
            Self::Accelerator(device) => AcceleratorRuntime::default_client(device)
                .allocator()
                .deallocate(ptr, size_bytes),
        }
    }

    /// Live bytes allocated in this domain through [`Self::allocate`]
    ///
    /// The host domain is process-wide.
    pub fn allocated_bytes(&self) -> usize {
        match self {
            Self::Host => HostRuntime::default_client(&HostDevice::new())
                .allocator()
                .allocated_bytes(),
            Self::Accelerator(device) => AcceleratorRuntime::default_client(device)
                .allocator()
                .allocated_bytes(),
        }
    }

    /// Fail unless the range is addressable in this domain
    pub(crate) fn check_owns(&self, ptr: u64, size_bytes: usize) -> Result<()> {
        match self {
            Self::Host if ptr == 0 && size_bytes > 0 => {
                Err(Error::invalid_argument("ptr", "null host pointer"))
            }
            Self::Host => Ok(()),
            Self::Accelerator(device) => device.check_owns(ptr, size_bytes),
        }
    }
}

impl std::fmt::Display for MemoryDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

fn ensure_writable(dst: &Buffer) -> Result<()> {
    if dst.is_mutable() {
        Ok(())
    } else {
        Err(Error::invalid_argument("dst", "destination buffer is read-only"))
    }
}

/// Copy all of `src` into the front of `dst`
///
/// Both buffers must have the same dtype and `dst` must be at least as long
/// as `src`.
pub fn copy(dst: &Buffer, src: &Buffer) -> Result<Event> {
    ensure_writable(dst)?;
    if dst.dtype() != src.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: dst.dtype(),
            rhs: src.dtype(),
        });
    }
    if dst.len() < src.len() {
        return Err(Error::shape_mismatch(&[src.len()], &[dst.len()]));
    }

    let size_bytes = src.size_in_bytes();
    let (src_ptr, dst_ptr) = (src.data_ptr(), dst.data_ptr());

    match (src.domain(), dst.domain()) {
        (MemoryDomain::Host, MemoryDomain::Host) => {
            HostRuntime::copy_within_device(src_ptr, dst_ptr, size_bytes, &HostDevice::new())?;
            Ok(Event::completed())
        }
        (MemoryDomain::Host, MemoryDomain::Accelerator(device)) => {
            device.check_owns(dst_ptr, size_bytes)?;
            let (src, dst, dev) = (src.clone(), dst.clone(), device.clone());
            Ok(device.queue().submit(move || {
                AcceleratorRuntime::copy_to_device(src.data_ptr(), dst.data_ptr(), size_bytes, &dev)
            }))
        }
        (MemoryDomain::Accelerator(device), MemoryDomain::Host) => {
            device.check_owns(src_ptr, size_bytes)?;
            let (src, dst, dev) = (src.clone(), dst.clone(), device.clone());
            Ok(device.queue().submit(move || {
                AcceleratorRuntime::copy_from_device(src.data_ptr(), dst.data_ptr(), size_bytes, &dev)
            }))
        }
        (MemoryDomain::Accelerator(from), MemoryDomain::Accelerator(to)) => {
            from.check_owns(src_ptr, size_bytes)?;
            to.check_owns(dst_ptr, size_bytes)?;
            let (src, dst, from_dev, to_dev) = (src.clone(), dst.clone(), from.clone(), to.clone());
            Ok(to.queue().submit(move || {
                if from_dev == to_dev {
                    AcceleratorRuntime::copy_within_device(
                        src.data_ptr(),
                        dst.data_ptr(),
                        size_bytes,
                        &to_dev,
                    )
                } else {
                    to_dev.check_owns(dst.data_ptr(), size_bytes)?;
                    AcceleratorRuntime::copy_from_device(
                        src.data_ptr(),
                        dst.data_ptr(),
                        size_bytes,
                        &from_dev,
                    )
                }
            }))
        }
    }
}

/// Set every byte of `dst` to `value`
pub fn memset(dst: &Buffer, value: u8) -> Result<Event> {
    ensure_writable(dst)?;
    let size_bytes = dst.size_in_bytes();

    match dst.domain() {
        MemoryDomain::Host => {
            HostRuntime::write_bytes(dst.data_ptr(), value, size_bytes, &HostDevice::new())?;
            Ok(Event::completed())
        }
        MemoryDomain::Accelerator(device) => {
            device.check_owns(dst.data_ptr(), size_bytes)?;
            let (dst, dev) = (dst.clone(), device.clone());
            Ok(device.queue().submit(move || {
                AcceleratorRuntime::write_bytes(dst.data_ptr(), value, size_bytes, &dev)
            }))
        }
    }
}

/// Write `value` into every element of `dst`
fn fill_raw<T: Element>(ptr: u64, len: usize, value: T) {
    if len == 0 {
        return;
    }
    // SAFETY: ptr addresses a live, aligned allocation of at least len elements
    let slice = unsafe { std::slice::from_raw_parts_mut(ptr as *mut T, len) };
    slice.fill(value);
}

/// Set every element of `dst` to `value`
pub fn fill<T: Element>(dst: &Array<T>, value: T) -> Result<Event> {
    let buffer = dst.buffer();
    ensure_writable(buffer)?;

    match buffer.domain() {
        MemoryDomain::Host => {
            buffer.domain().check_owns(buffer.data_ptr(), buffer.size_in_bytes())?;
            fill_raw(buffer.data_ptr(), buffer.len(), value);
            Ok(Event::completed())
        }
        MemoryDomain::Accelerator(device) => {
            device.check_owns(buffer.data_ptr(), buffer.size_in_bytes())?;
            let (buffer, dev) = (buffer.clone(), device.clone());
            Ok(device.queue().submit(move || {
                dev.check_owns(buffer.data_ptr(), buffer.size_in_bytes())?;
                fill_raw(buffer.data_ptr(), buffer.len(), value);
                Ok(())
            }))
        }
    }
}

/// Copy host values into the front of `dst`
///
/// The values are staged, so `src` may be dropped as soon as this returns.
pub fn copy_from_host<T: Element>(dst: &Array<T>, src: &[T]) -> Result<Event> {
    let staging = Array::from_vec(src.to_vec());
    copy(dst.buffer(), staging.buffer())
}

/// Copy the contents of `src` into `dst`, blocking until done
///
/// Accelerator data is first copied into a host staging buffer by the
/// device queue, so pending operations on `src` are ordered before the read.
pub fn copy_to_host<T: Element>(src: &Array<T>, dst: &mut [T]) -> Result<()> {
    if dst.len() < src.len() {
        return Err(Error::shape_mismatch(&[src.len()], &[dst.len()]));
    }

    let staging = Array::<T>::allocate(&MemoryDomain::Host, src.len())?;
    copy(staging.buffer(), src.buffer())?.wait()?;
    dst[..src.len()].copy_from_slice(staging.as_slice()?);
    Ok(())
}
