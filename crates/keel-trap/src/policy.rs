use crate::context::{Msr, TrapContext};
use crate::cpu::CoreVmState;
use crate::trap::FaultDelegate;
use crate::vector::TrapVector;
use log::{debug, trace};

/// What the summary line says about a trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    SystemReset { fatal: bool },
    RecoverableMachineCheck,
    MachineCheck,
    Storage { store: bool, dar: u64 },
    Segment { dar: u64 },
    Ifetch,
    Unknown { vector: u64 },
}

impl Report {
    /// Reports preceded by the asterisk banner
    pub fn wants_banner(&self) -> bool {
        matches!(
            self,
            Report::SystemReset { .. } | Report::MachineCheck | Report::Unknown { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A fault delegate fixed the translation; resume silently.
    Repaired,
    /// Informational event; report it and resume.
    Logged(Report),
    /// Machine check with translation on: resume with IR/DR cleared.
    RetryWithoutVm,
    Fatal(Report),
}

impl Verdict {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Verdict::Fatal(_))
    }
}

/// Decide the fate of one trap.
///
/// `nip`/`msr` are the authoritative resume pair. A clear RI bit is fatal
/// for every vector and no fault delegate is consulted in that case.
///
/// Only the machine check retry mutates state: it clears IR/DR in SRR1 and
/// marks the core's VM as torn down. It is attempted once; a repeat fault
/// arrives as a fresh trap with translation already off.
pub fn evaluate(
    vector: TrapVector,
    ctx: &mut TrapContext,
    nip: u64,
    msr: u64,
    core: &mut CoreVmState,
    delegate: &mut dyn FaultDelegate,
) -> Verdict {
    let msr_bits = Msr::from_bits_retain(msr);
    let recoverable = msr_bits.contains(Msr::RI);
    trace!(
        "evaluate vector={:#x} nip={:#x} msr={:#x} ri={}",
        vector.raw(),
        nip,
        msr,
        recoverable
    );

    match vector {
        TrapVector::SystemReset => {
            if recoverable {
                Verdict::Logged(Report::SystemReset { fatal: false })
            } else {
                Verdict::Fatal(Report::SystemReset { fatal: true })
            }
        }
        TrapVector::MachineCheck => {
            if !recoverable {
                return Verdict::Fatal(Report::MachineCheck);
            }
            // The retry assumes a linear map; a local map breaks that.
            if core.vm_local_map_inuse {
                debug!("machine check on core {:#x} with local map in use", core.pir);
                return Verdict::Fatal(Report::MachineCheck);
            }
            if msr_bits.intersects(Msr::TRANSLATION) {
                debug!("machine check on core {:#x}, dropping VM", core.pir);
                core.vm_setup = false;
                // Machine checks always arrive through SRR0/SRR1.
                ctx.srr1 &= !Msr::TRANSLATION.bits();
                return Verdict::RetryWithoutVm;
            }
            Verdict::Fatal(Report::MachineCheck)
        }
        TrapVector::DataStorage => {
            let store = ctx.is_store();
            let dar = ctx.dar;
            if recoverable && delegate.dsi(nip, dar, store) {
                return Verdict::Repaired;
            }
            Verdict::Fatal(Report::Storage { store, dar })
        }
        TrapVector::DataSegment => {
            let dar = ctx.dar;
            if recoverable && delegate.dslb(nip, dar) {
                return Verdict::Repaired;
            }
            Verdict::Fatal(Report::Segment { dar })
        }
        TrapVector::InstructionStorage => {
            if recoverable && delegate.isi(nip) {
                return Verdict::Repaired;
            }
            Verdict::Fatal(Report::Ifetch)
        }
        TrapVector::InstructionSegment => {
            // Reported as a plain ifetch, same as the storage variant.
            if recoverable && delegate.islb(nip) {
                return Verdict::Repaired;
            }
            Verdict::Fatal(Report::Ifetch)
        }
        other => Verdict::Fatal(Report::Unknown { vector: other.raw() }),
    }
}
