use crate::context::TrapContext;
use crate::cpu::CoreVmState;
use crate::diag::{self, DiagSink};
use crate::policy::{self, Report, Verdict};
use crate::trap::{FaultDelegate, Platform};
use crate::vector::{Privilege, TrapVector};
use log::debug;

/// How a non-fatal trap returns to the interrupted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Resume,
    /// Returning with instruction and data translation switched off
    RetryWithoutVm,
}

/// Per-core trap entry. Borrows everything it needs for one invocation.
pub struct Dispatcher<'a> {
    platform: &'a mut dyn Platform,
    delegate: &'a mut dyn FaultDelegate,
    sink: &'a mut dyn DiagSink,
    core: &'a mut CoreVmState,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        platform: &'a mut dyn Platform,
        delegate: &'a mut dyn FaultDelegate,
        sink: &'a mut dyn DiagSink,
        core: &'a mut CoreVmState,
    ) -> Self {
        Self {
            platform,
            delegate,
            sink,
            core,
        }
    }

    /// Handle one trap described by `ctx`. Returns only if execution may
    /// continue; a fatal trap ends in `Platform::halt`.
    pub fn exception_entry(&mut self, ctx: &mut TrapContext) -> Outcome {
        let vector = TrapVector::from_raw(ctx.trap_type);
        let privilege = vector.privilege();
        let (nip, msr) = ctx.resume_pair(privilege);
        debug!(
            "trap {:#x} ({:?}) on core {:#x}, nip={:#x}",
            vector.raw(),
            privilege,
            self.core.pir,
            nip
        );

        let verdict = policy::evaluate(vector, ctx, nip, msr, &mut *self.core, &mut *self.delegate);
        debug!("trap {:#x} verdict {:?}", vector.raw(), verdict);

        self.report(ctx, &verdict, nip, msr);
        self.epilogue(ctx, privilege, verdict, nip, msr)
    }

    fn report(&mut self, ctx: &TrapContext, verdict: &Verdict, nip: u64, msr: u64) {
        match *verdict {
            Verdict::Repaired => {}
            Verdict::RetryWithoutVm => {
                self.summary(&Report::RecoverableMachineCheck, nip, msr);
                diag::dump_regs(ctx, &mut *self.sink);
                self.sink.line("Continuing with VM off");
            }
            Verdict::Logged(report) | Verdict::Fatal(report) => {
                if report.wants_banner() {
                    diag::banner(&mut *self.sink);
                }
                self.summary(&report, nip, msr);
                diag::dump_regs(ctx, &mut *self.sink);
                if !verdict.is_fatal() {
                    self.platform.backtrace(&mut *self.sink);
                }
            }
        }
    }

    fn summary(&mut self, report: &Report, nip: u64, msr: u64) {
        let line = diag::summary(report, nip, msr, self.platform.symbol(nip));
        self.sink.line(line.as_str());
    }

    /// Single exit for every verdict: halts, or writes back the resume pair.
    fn epilogue(
        &mut self,
        ctx: &mut TrapContext,
        privilege: Privilege,
        verdict: Verdict,
        nip: u64,
        msr: u64,
    ) -> Outcome {
        let outcome = match verdict {
            Verdict::Fatal(_) => self.platform.halt(),
            Verdict::RetryWithoutVm => Outcome::RetryWithoutVm,
            Verdict::Repaired | Verdict::Logged(_) => Outcome::Resume,
        };

        // Return from the trap goes through SRR0/SRR1.
        if privilege == Privilege::Hypervisor {
            ctx.srr0 = nip;
            ctx.srr1 = msr;
        }
        outcome
    }
}
