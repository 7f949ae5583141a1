//! Host client and allocator implementation

use super::device::HostDevice;
use super::runtime::HostRuntime;
use crate::error::Result;
use crate::runtime::{DefaultAllocator, Runtime, RuntimeClient};

/// Host client for operation dispatch
#[derive(Clone, Debug)]
pub struct HostClient {
    pub(crate) device: HostDevice,
    allocator: HostAllocator,
}

impl HostClient {
    /// Create a new host client
    pub fn new(device: HostDevice) -> Self {
        let allocator = DefaultAllocator::new(
            device.clone(),
            HostRuntime::allocate,
            HostRuntime::deallocate,
        );
        Self { device, allocator }
    }
}

impl RuntimeClient<HostRuntime> for HostClient {
    fn device(&self) -> &HostDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // Host operations are synchronous, nothing to do
        Ok(())
    }

    fn allocator(&self) -> &HostAllocator {
        &self.allocator
    }
}

/// Host-specific allocator type alias
pub type HostAllocator = DefaultAllocator<HostDevice>;
