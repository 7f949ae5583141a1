//! Core trait for memory-domain backends

use crate::error::Result;

/// Core trait for memory-domain backends
///
/// `Runtime` abstracts over the places numeric data can live: host memory
/// or accelerator-addressable memory. It uses static dispatch; the runtime
/// choice of domain is made by [`MemoryDomain`](crate::runtime::MemoryDomain),
/// which forwards to one of these implementations.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific memory context (the host, accelerator 0, ...)
/// - `Client`: Dispatches operations, owns the queue where there is one
/// - `Allocator`: Memory management with optional usage tracking
///
/// # Example
///
/// ```ignore
/// let device = HostRuntime::default_device();
/// let client = HostRuntime::default_client(&device);
/// let ptr = client.allocator().allocate(1024)?;
/// // ... use memory ...
/// client.allocator().deallocate(ptr, 1024);
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: super::Device;

    /// Client for dispatching operations
    type Client: super::RuntimeClient<Self>;

    /// Memory allocator type
    type Allocator: crate::runtime::Allocator;

    /// Allocate zero-initialized memory
    ///
    /// Returns a pointer (u64) usable with the other primitives of this runtime.
    /// Returns `Err(OutOfMemory)` if the domain cannot satisfy the request.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate memory previously returned by `allocate`
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy `size_bytes` between two pointers addressable by this runtime
    ///
    /// Overlapping ranges are allowed.
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Set `size_bytes` bytes starting at `dst` to `value`
    fn write_bytes(dst: u64, value: u8, size_bytes: usize, device: &Self::Device) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the client for a device
    ///
    /// Clients of the same device share their allocator's live-byte counter.
    fn default_client(device: &Self::Device) -> Self::Client;
}
