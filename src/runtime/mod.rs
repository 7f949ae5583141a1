//! Memory-domain backends
//!
//! This module defines the `Runtime` trait and its two implementations:
//! host memory and accelerator-addressable memory. [`MemoryDomain`] selects
//! between them at runtime, and [`memory`] holds the only primitives allowed
//! to touch raw memory.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a memory context: the host, accelerator N)
//! ├── Client (dispatches operations, owns the queue where there is one)
//! └── Allocator (memory management with live-byte tracking)
//!
//! MemoryDomain::{Host, Accelerator(device)}  -- runtime dispatch
//! memory::{copy, memset, fill}                -- return an Event
//! ```

pub mod accelerator;
mod allocator;
mod event;
pub mod host;
pub mod memory;
mod traits;

pub use allocator::{Allocator, DefaultAllocator};
pub use event::{Event, EventStatus, wait_all};
pub use memory::MemoryDomain;
pub use traits::{Device, Runtime, RuntimeClient};
