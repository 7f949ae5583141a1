//! Host device implementation

use crate::runtime::Device;

/// Host device (there's only one: the process address space)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostDevice {
    id: usize,
}

impl HostDevice {
    /// Create a new host device
    pub fn new() -> Self {
        Self { id: 0 }
    }
}

impl Device for HostDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        "host".to_string()
    }
}
