//! Host runtime implementation
//!
//! Host memory is allocated on the heap with 64-byte alignment. All host
//! memory operations are synchronous.

mod client;
mod device;
mod runtime;

pub use client::{HostAllocator, HostClient};
pub use device::HostDevice;
pub use runtime::HostRuntime;

pub(crate) use runtime::{aligned_alloc, aligned_dealloc};
