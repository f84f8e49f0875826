pub mod delegate;
pub mod error;
pub mod platform;

use delegate::{RepairPlan, ScriptedDelegate};
use error::SimError;
use keel_trap::{
    opal, sleep, CoreVmState, DiagSink, LogSink, Dispatcher, Dsisr, Outcome, Privilege, TrapContext,
    TrapVector,
};
use log::info;
use platform::{BacktraceFrame, HaltMode, Halted, SimPlatform, SprFile};
use std::panic::{self, AssertUnwindSafe};

pub struct SimConfig {
    pub pir: u32,
    pub symbols: Vec<(u64, String)>,
    pub backtrace: Vec<BacktraceFrame>,
    pub sprs: SprFile,
    pub repair: RepairPlan,
    pub vm_setup: bool,
    pub vm_local_map_inuse: bool,
    pub halt_mode: HaltMode,
    /// Print diagnostic lines to stdout as they are emitted
    pub echo: bool,
    /// Also forward diagnostic lines to the firmware console log
    pub log_lines: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pir: 0,
            symbols: Vec::new(),
            backtrace: Vec::new(),
            sprs: SprFile::default(),
            repair: RepairPlan::default(),
            vm_setup: false,
            vm_local_map_inuse: false,
            halt_mode: HaltMode::Unwind,
            echo: false,
            log_lines: false,
        }
    }
}

/// Collects diagnostic lines, optionally echoing them like a console.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub lines: Vec<String>,
    echo: bool,
    console: Option<LogSink>,
}

impl CaptureSink {
    pub fn new(echo: bool) -> Self {
        Self {
            lines: Vec::new(),
            echo,
            console: None,
        }
    }

    /// Forward every line to `LogSink` as well.
    pub fn with_console(mut self) -> Self {
        self.console = Some(LogSink);
        self
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

impl DiagSink for CaptureSink {
    fn line(&mut self, text: &str) {
        if self.echo {
            println!("{}", text);
        }
        if let Some(console) = self.console.as_mut() {
            console.line(text);
        }
        self.lines.push(text.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    Resumed(Outcome),
    Halted,
}

/// Register values describing one trap, as the entry stub would capture them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapScenario {
    pub vector: u64,
    pub nip: u64,
    pub msr: u64,
    pub dar: u64,
    pub store: bool,
    pub lr: u64,
    pub ctr: u64,
    pub cfar: u64,
}

impl TrapScenario {
    /// Build the context, placing `nip`/`msr` in the pair the vector uses.
    pub fn context(&self) -> TrapContext {
        let mut ctx = TrapContext::new(self.vector);
        match TrapVector::from_raw(self.vector).privilege() {
            Privilege::Hypervisor => {
                ctx.hsrr0 = self.nip;
                ctx.hsrr1 = self.msr;
            }
            Privilege::Supervisor => {
                ctx.srr0 = self.nip;
                ctx.srr1 = self.msr;
            }
        }
        ctx.dar = self.dar;
        if self.store {
            ctx.dsisr = Dsisr::ISSTORE.bits();
        }
        ctx.lr = self.lr;
        ctx.ctr = self.ctr;
        ctx.cfar = self.cfar;
        ctx
    }
}

/// One simulated core with its firmware collaborators.
pub struct Simulator {
    pub platform: SimPlatform,
    pub delegate: ScriptedDelegate,
    pub sink: CaptureSink,
    pub core: CoreVmState,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        let mut core = CoreVmState::new(config.pir);
        core.vm_setup = config.vm_setup;
        core.vm_local_map_inuse = config.vm_local_map_inuse;
        Self {
            platform: SimPlatform::new(
                config.pir,
                config.symbols,
                config.backtrace,
                config.sprs,
                config.halt_mode,
            ),
            delegate: ScriptedDelegate::new(config.repair),
            sink: if config.log_lines {
                CaptureSink::new(config.echo).with_console()
            } else {
                CaptureSink::new(config.echo)
            },
            core,
        }
    }

    pub fn dispatch(&mut self, ctx: &mut TrapContext) -> RunResult {
        info!("dispatching trap {:#x}", ctx.trap_type);
        let Self {
            platform,
            delegate,
            sink,
            core,
        } = self;
        observe_halt(|| {
            let mut dispatcher = Dispatcher::new(platform, delegate, sink, core);
            RunResult::Resumed(dispatcher.exception_entry(ctx))
        })
    }

    /// Dispatch a snapshot given as raw bytes, as laid down by the entry stub.
    pub fn dispatch_bytes(&mut self, bytes: &mut [u8]) -> Result<RunResult, SimError> {
        let ctx = TrapContext::from_bytes_mut(bytes)?;
        Ok(self.dispatch(ctx))
    }

    pub fn sleep_reset(&mut self) {
        sleep::pm_sreset(&mut self.platform, &mut self.sink);
    }

    pub fn sleep_machine_check(&mut self) -> RunResult {
        let Self { platform, sink, .. } = self;
        observe_halt(|| sleep::pm_mce(platform, sink))
    }

    pub fn register_exception_handler(&mut self, args: &[u64]) -> i64 {
        opal::opal_call(opal::OPAL_REGISTER_OPAL_EXCEPTION_HANDLER, args)
    }

    pub fn lines(&self) -> &[String] {
        &self.sink.lines
    }
}

/// Run `f`, turning a [`Halted`] unwind into `RunResult::Halted`. Any other
/// panic keeps unwinding.
fn observe_halt<F: FnOnce() -> RunResult>(f: F) -> RunResult {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) if payload.is::<Halted>() => RunResult::Halted,
        Err(payload) => panic::resume_unwind(payload),
    }
}

/// Keep the default panic hook quiet for simulated halts.
pub fn quiet_halts() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if !info.payload().is::<Halted>() {
            previous(info);
        }
    }));
}

/// Parse `0x`-prefixed hex or plain decimal.
pub fn parse_u64(s: &str) -> Result<u64, SimError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|_| SimError::InvalidNumber(s.to_string()))
}

/// Parse `name@address`.
pub fn parse_symbol(s: &str) -> Result<(u64, String), SimError> {
    match s.rsplit_once('@') {
        Some((name, addr)) if !name.is_empty() => Ok((parse_u64(addr)?, name.to_string())),
        _ => Err(SimError::InvalidSymbol(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_u64("0xdead_0000").unwrap(), 0xdead_0000);
        assert_eq!(parse_u64("4660").unwrap(), 0x1234);
        assert!(matches!(parse_u64("0xzz"), Err(SimError::InvalidNumber(_))));
    }

    #[test]
    fn symbols_split_on_last_at() {
        assert_eq!(
            parse_symbol("opal_entry@0x3000").unwrap(),
            (0x3000, "opal_entry".to_string())
        );
        assert!(parse_symbol("@0x3000").is_err());
        assert!(parse_symbol("opal_entry").is_err());
    }

    #[test]
    fn console_forwarding_still_captures() {
        let mut sink = CaptureSink::new(false).with_console();
        sink.line("Fatal ifetch at 0000000000003000");
        assert!(sink.contains("Fatal ifetch"));
        assert_eq!(sink.lines.len(), 1);
    }

    #[test]
    fn scenario_places_pair_by_privilege() {
        let hv = TrapScenario { vector: 0x980, nip: 1, msr: 2, ..Default::default() }.context();
        assert_eq!((hv.hsrr0, hv.hsrr1, hv.srr0, hv.srr1), (1, 2, 0, 0));
        let sv = TrapScenario { vector: 0x300, nip: 1, msr: 2, store: true, ..Default::default() }
            .context();
        assert_eq!((sv.srr0, sv.srr1, sv.hsrr0), (1, 2, 0));
        assert!(sv.is_store());
    }
}
