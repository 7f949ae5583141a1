//! Accelerator client and allocator implementation

use super::device::AcceleratorDevice;
use super::runtime::AcceleratorRuntime;
use crate::error::Result;
use crate::runtime::{DefaultAllocator, Runtime, RuntimeClient};

/// Accelerator client: dispatches through the device queue
#[derive(Clone, Debug)]
pub struct AcceleratorClient {
    device: AcceleratorDevice,
    allocator: AcceleratorAllocator,
}

impl AcceleratorClient {
    /// Create a client for `device`
    ///
    /// Every client of one device reports into the device's live-byte counter.
    pub fn new(device: AcceleratorDevice) -> Self {
        let allocator = DefaultAllocator::with_counter(
            device.clone(),
            AcceleratorRuntime::allocate,
            AcceleratorRuntime::deallocate,
            device.client_bytes(),
        );
        Self { device, allocator }
    }
}

impl RuntimeClient<AcceleratorRuntime> for AcceleratorClient {
    fn device(&self) -> &AcceleratorDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.device.queue().wait()
    }

    fn allocator(&self) -> &AcceleratorAllocator {
        &self.allocator
    }
}

/// Accelerator-specific allocator type alias
pub type AcceleratorAllocator = DefaultAllocator<AcceleratorDevice>;
