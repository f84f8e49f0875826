use keel_trap::FaultDelegate;
use log::debug;

/// Which fault delegate hooks report a successful repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairPlan {
    pub dsi: bool,
    pub dslb: bool,
    pub isi: bool,
    pub islb: bool,
}

impl RepairPlan {
    pub fn all() -> Self {
        Self {
            dsi: true,
            dslb: true,
            isi: true,
            islb: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateCall {
    Dsi { nip: u64, dar: u64, store: bool },
    Dslb { nip: u64, dar: u64 },
    Isi { nip: u64 },
    Islb { nip: u64 },
}

/// Fault delegate answering from a fixed plan and recording every call.
#[derive(Debug, Default)]
pub struct ScriptedDelegate {
    plan: RepairPlan,
    pub calls: Vec<DelegateCall>,
}

impl ScriptedDelegate {
    pub fn new(plan: RepairPlan) -> Self {
        Self {
            plan,
            calls: Vec::new(),
        }
    }

    fn answer(&mut self, call: DelegateCall, repaired: bool) -> bool {
        debug!("{:?} -> repaired={}", call, repaired);
        self.calls.push(call);
        repaired
    }
}

impl FaultDelegate for ScriptedDelegate {
    fn dsi(&mut self, nip: u64, dar: u64, store: bool) -> bool {
        self.answer(DelegateCall::Dsi { nip, dar, store }, self.plan.dsi)
    }

    fn dslb(&mut self, nip: u64, dar: u64) -> bool {
        self.answer(DelegateCall::Dslb { nip, dar }, self.plan.dslb)
    }

    fn isi(&mut self, nip: u64) -> bool {
        self.answer(DelegateCall::Isi { nip }, self.plan.isi)
    }

    fn islb(&mut self, nip: u64) -> bool {
        self.answer(DelegateCall::Islb { nip }, self.plan.islb)
    }
}
