//! Accelerator runtime implementation
//!
//! Accelerator memory is owned by an [`AcceleratorDevice`]. Every pointer it
//! hands out is recorded in the device's registry so that operations can
//! assert a pointer belongs to the device before touching it. Operations
//! involving accelerator memory are submitted to the device's in-order
//! [`Queue`] and complete asynchronously; callers wait on the returned
//! [`Event`](crate::runtime::Event).
//!
//! The memory is accelerator-addressable in the unified-shared sense: the
//! host can reach it, but only through the queue. Reading it directly from
//! the host without going through the memory primitives is refused.

mod client;
mod device;
mod queue;
mod runtime;

pub use client::{AcceleratorAllocator, AcceleratorClient};
pub use device::AcceleratorDevice;
pub use queue::Queue;
pub use runtime::AcceleratorRuntime;
