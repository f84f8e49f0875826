/// Virtual memory flags owned by one core.
///
/// Only the owning core's trap path writes these; nothing else touches them,
/// so no locking is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreVmState {
    /// Processor id, printed in backtrace headers
    pub pir: u32,
    /// Translation is set up and enabled on this core
    pub vm_setup: bool,
    /// A local (non-linear) map is currently installed
    pub vm_local_map_inuse: bool,
}

impl CoreVmState {
    pub fn new(pir: u32) -> Self {
        Self {
            pir,
            vm_setup: false,
            vm_local_map_inuse: false,
        }
    }

    pub fn with_vm(mut self) -> Self {
        self.vm_setup = true;
        self
    }

    pub fn with_local_map(mut self) -> Self {
        self.vm_local_map_inuse = true;
        self
    }
}
