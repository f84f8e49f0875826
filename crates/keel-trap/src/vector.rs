/// Which privilege level's resume pair (SRR or HSRR) the hardware filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Hypervisor,
    Supervisor,
}

/// Trap vector offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapVector {
    SystemReset,
    MachineCheck,
    DataStorage,
    DataSegment,
    InstructionStorage,
    InstructionSegment,
    External,
    HypervisorDecrementer,
    HypervisorDataStorage,
    HypervisorInstructionStorage,
    HypervisorEmulationAssist,
    HypervisorMaintenance,
    DirectedHypervisorDoorbell,
    HypervisorVirtualization,
    HypervisorFacilityUnavailable,
    Other(u64),
}

impl TrapVector {
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            0x100 => TrapVector::SystemReset,
            0x200 => TrapVector::MachineCheck,
            0x300 => TrapVector::DataStorage,
            0x380 => TrapVector::DataSegment,
            0x400 => TrapVector::InstructionStorage,
            0x480 => TrapVector::InstructionSegment,
            0x500 => TrapVector::External,
            0x980 => TrapVector::HypervisorDecrementer,
            0xe00 => TrapVector::HypervisorDataStorage,
            0xe20 => TrapVector::HypervisorInstructionStorage,
            0xe40 => TrapVector::HypervisorEmulationAssist,
            0xe60 => TrapVector::HypervisorMaintenance,
            0xe80 => TrapVector::DirectedHypervisorDoorbell,
            0xea0 => TrapVector::HypervisorVirtualization,
            0xf80 => TrapVector::HypervisorFacilityUnavailable,
            other => TrapVector::Other(other),
        }
    }

    pub fn raw(&self) -> u64 {
        match self {
            TrapVector::SystemReset => 0x100,
            TrapVector::MachineCheck => 0x200,
            TrapVector::DataStorage => 0x300,
            TrapVector::DataSegment => 0x380,
            TrapVector::InstructionStorage => 0x400,
            TrapVector::InstructionSegment => 0x480,
            TrapVector::External => 0x500,
            TrapVector::HypervisorDecrementer => 0x980,
            TrapVector::HypervisorDataStorage => 0xe00,
            TrapVector::HypervisorInstructionStorage => 0xe20,
            TrapVector::HypervisorEmulationAssist => 0xe40,
            TrapVector::HypervisorMaintenance => 0xe60,
            TrapVector::DirectedHypervisorDoorbell => 0xe80,
            TrapVector::HypervisorVirtualization => 0xea0,
            TrapVector::HypervisorFacilityUnavailable => 0xf80,
            TrapVector::Other(raw) => *raw,
        }
    }

    /// Vectors delivered through HSRR0/HSRR1; everything else uses SRR0/SRR1.
    pub fn privilege(&self) -> Privilege {
        match self {
            TrapVector::External
            | TrapVector::HypervisorDecrementer
            | TrapVector::HypervisorDataStorage
            | TrapVector::HypervisorInstructionStorage
            | TrapVector::HypervisorEmulationAssist
            | TrapVector::HypervisorMaintenance
            | TrapVector::DirectedHypervisorDoorbell
            | TrapVector::HypervisorVirtualization
            | TrapVector::HypervisorFacilityUnavailable => Privilege::Hypervisor,
            _ => Privilege::Supervisor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HV_VECTORS: [u64; 9] = [0x500, 0x980, 0xe00, 0xe20, 0xe40, 0xe60, 0xe80, 0xea0, 0xf80];

    #[test]
    fn hypervisor_set_is_exact() {
        for raw in (0..0x1000u64).step_by(0x20) {
            let expected = if HV_VECTORS.contains(&raw) {
                Privilege::Hypervisor
            } else {
                Privilege::Supervisor
            };
            assert_eq!(TrapVector::from_raw(raw).privilege(), expected, "vector {raw:#x}");
        }
    }

    #[test]
    fn raw_survives_classification() {
        for raw in [0x100, 0x200, 0x380, 0xea0, 0x1234, 0] {
            assert_eq!(TrapVector::from_raw(raw).raw(), raw);
        }
        assert_eq!(TrapVector::from_raw(0x1234), TrapVector::Other(0x1234));
    }
}
