use crate::error::ContextError;
use crate::vector::Privilege;
use bitflags::bitflags;
use bytemuck::{Pod, PodCastError, Zeroable};

bitflags! {
    /// Machine state register bits the trap path inspects.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct Msr: u64 {
        /// Instruction relocation (translation) enabled
        const IR = 1 << 5;
        /// Data relocation (translation) enabled
        const DR = 1 << 4;
        /// Recoverable interrupt: state was consistent enough to return
        const RI = 1 << 1;

        const TRANSLATION = Self::IR.bits() | Self::DR.bits();
    }
}

bitflags! {
    /// Data storage interrupt status register.
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub struct Dsisr: u32 {
        const ISSTORE = 0x0200_0000;
    }
}

/// Special purpose registers still readable when a trap hits a sleeping core.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Spr {
    Dsisr,
    Dar,
    Srr0,
    Srr1,
}

/// Register snapshot captured by the entry stub.
/// The layout is shared with the assembly stub and must not be reordered.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct TrapContext {
    pub trap_type: u64,
    pub gpr: [u64; 32],
    pub srr0: u64,
    pub srr1: u64,
    pub hsrr0: u64,
    pub hsrr1: u64,
    pub dar: u64,
    pub lr: u64,
    pub ctr: u64,
    pub cfar: u64,
    pub msr: u64,
    pub cr: u32,
    pub xer: u32,
    pub dsisr: u32,
    pub _reserved: u32,
}

pub const TRAP_CONTEXT_SIZE: usize = core::mem::size_of::<TrapContext>();

impl Default for TrapContext {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl TrapContext {
    pub fn new(trap_type: u64) -> Self {
        Self {
            trap_type,
            ..Self::default()
        }
    }

    /// Borrow a snapshot laid down in raw memory by the entry stub.
    pub fn from_bytes(bytes: &[u8]) -> Result<&TrapContext, ContextError> {
        bytemuck::try_from_bytes(bytes).map_err(|e| cast_error(e, bytes.len()))
    }

    pub fn from_bytes_mut(bytes: &mut [u8]) -> Result<&mut TrapContext, ContextError> {
        let len = bytes.len();
        bytemuck::try_from_bytes_mut(bytes).map_err(|e| cast_error(e, len))
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// The (next instruction, machine state) pair authoritative for `privilege`.
    pub fn resume_pair(&self, privilege: Privilege) -> (u64, u64) {
        match privilege {
            Privilege::Hypervisor => (self.hsrr0, self.hsrr1),
            Privilege::Supervisor => (self.srr0, self.srr1),
        }
    }

    pub fn is_store(&self) -> bool {
        Dsisr::from_bits_retain(self.dsisr).contains(Dsisr::ISSTORE)
    }
}

fn cast_error(e: PodCastError, actual: usize) -> ContextError {
    match e {
        PodCastError::SizeMismatch | PodCastError::OutputSliceWouldHaveSlop => {
            ContextError::SizeMismatch {
                expected: TRAP_CONTEXT_SIZE,
                actual,
            }
        }
        PodCastError::TargetAlignmentGreaterAndInputNotAligned
        | PodCastError::AlignmentMismatch => ContextError::Misaligned {
            alignment: core::mem::align_of::<TrapContext>(),
        },
    }
}
