use crate::error::SimError;
use crate::parse_u64;
use keel_trap::{nearest_symbol, DiagSink, Platform, Spr, Symbol};
use log::error;

/// Panic payload used by [`HaltMode::Unwind`].
#[derive(Debug)]
pub struct Halted;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltMode {
    /// Unwind with a [`Halted`] payload so the caller can observe the halt
    Unwind,
    /// Terminate the host process with this exit code
    Exit(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktraceFrame {
    pub sp: u64,
    pub ret: u64,
}

impl BacktraceFrame {
    /// Parse `sp:return`, both in hex or decimal.
    pub fn parse(s: &str) -> Result<Self, SimError> {
        let (sp, ret) = s
            .split_once(':')
            .ok_or_else(|| SimError::InvalidFrame(s.to_string()))?;
        Ok(Self {
            sp: parse_u64(sp)?,
            ret: parse_u64(ret)?,
        })
    }
}

/// SPR values visible to the sleep-state entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SprFile {
    pub srr0: u64,
    pub srr1: u64,
    pub dsisr: u64,
    pub dar: u64,
}

pub struct SimPlatform {
    pir: u32,
    symbols: Vec<(u64, String)>,
    frames: Vec<BacktraceFrame>,
    sprs: SprFile,
    halt_mode: HaltMode,
    pub halted: bool,
}

impl SimPlatform {
    pub fn new(
        pir: u32,
        mut symbols: Vec<(u64, String)>,
        frames: Vec<BacktraceFrame>,
        sprs: SprFile,
        halt_mode: HaltMode,
    ) -> Self {
        symbols.sort_by_key(|(base, _)| *base);
        Self {
            pir,
            symbols,
            frames,
            sprs,
            halt_mode,
            halted: false,
        }
    }
}

impl Platform for SimPlatform {
    fn halt(&mut self) -> ! {
        self.halted = true;
        error!("firmware halted on core {:#x}", self.pir);
        match self.halt_mode {
            HaltMode::Unwind => std::panic::panic_any(Halted),
            HaltMode::Exit(code) => {
                println!("System halted.");
                std::process::exit(code)
            }
        }
    }

    fn backtrace(&mut self, sink: &mut dyn DiagSink) {
        sink.line(&format!("CPU {:04x} Backtrace:", self.pir));
        for frame in &self.frames {
            let name = match self.symbol(frame.ret) {
                Some(sym) => format!("{}+{:#x}", sym.name, frame.ret - sym.base),
                None => String::new(),
            };
            sink.line(&format!(" S: {:016x} R: {:016x}   {}", frame.sp, frame.ret, name));
        }
    }

    fn symbol(&self, addr: u64) -> Option<Symbol<'_>> {
        nearest_symbol(&self.symbols, addr)
    }

    fn read_spr(&self, spr: Spr) -> u64 {
        match spr {
            Spr::Srr0 => self.sprs.srr0,
            Spr::Srr1 => self.sprs.srr1,
            Spr::Dsisr => self.sprs.dsisr,
            Spr::Dar => self.sprs.dar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines(Vec<String>);

    impl DiagSink for Lines {
        fn line(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
    }

    fn platform() -> SimPlatform {
        SimPlatform::new(
            0x28,
            vec![(0x3400, "vm_dsi".into()), (0x3000, "exception_entry".into())],
            vec![BacktraceFrame { sp: 0x3100_0000, ret: 0x3410 }],
            SprFile::default(),
            HaltMode::Unwind,
        )
    }

    #[test]
    fn symbols_are_sorted_on_construction() {
        let plat = platform();
        assert_eq!(plat.symbol(0x3010).map(|s| s.name), Some("exception_entry"));
        assert_eq!(plat.symbol(0x3400).map(|s| s.name), Some("vm_dsi"));
        assert_eq!(plat.symbol(0x10), None);
    }

    #[test]
    fn backtrace_symbolizes_return_addresses() {
        let mut plat = platform();
        let mut lines = Lines(Vec::new());
        plat.backtrace(&mut lines);
        assert_eq!(
            lines.0,
            [
                "CPU 0028 Backtrace:",
                " S: 0000000031000000 R: 0000000000003410   vm_dsi+0x10",
            ]
        );
    }

    #[test]
    fn frame_parses_hex_pair() {
        assert_eq!(
            BacktraceFrame::parse("0x31000000:0x3410").unwrap(),
            BacktraceFrame { sp: 0x3100_0000, ret: 0x3410 }
        );
        assert!(BacktraceFrame::parse("0x3410").is_err());
    }
}
