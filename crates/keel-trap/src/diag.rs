use crate::context::TrapContext;
use crate::policy::Report;
use crate::trap::Symbol;
use core::fmt::{self, Write};
use log::error;

/// Capacity of one diagnostic line
pub const EXCEPTION_MAX_STR: usize = 320;

pub const BANNER: &str = "***********************************************";

const REGS_PER_LINE: usize = 4;

/// Receives finished diagnostic lines.
pub trait DiagSink {
    fn line(&mut self, text: &str);
}

/// Default sink: the firmware console via the `log` facade at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagSink for LogSink {
    fn line(&mut self, text: &str) {
        error!("{}", text);
    }
}

/// Fixed capacity text buffer for one diagnostic line. Output beyond `N`
/// bytes is dropped at a character boundary and everything written
/// afterwards is discarded.
///
/// Nothing in the trap path allocates: each line is assembled on the stack
/// and handed to a [`DiagSink`] once complete, so formatting still works
/// when the rest of the firmware is half initialised.
pub struct DiagBuffer<const N: usize> {
    buf: [u8; N],
    len: usize,
    truncated: bool,
}

impl<const N: usize> DiagBuffer<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
            truncated: false,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        N - self.len
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn as_str(&self) -> &str {
        // Only whole characters are ever copied in.
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    /// Append formatted text, clipped to `remaining()`. Returns bytes added.
    pub fn append(&mut self, args: fmt::Arguments<'_>) -> usize {
        let before = self.len;
        let _ = self.write_fmt(args);
        self.len - before
    }

    fn push_clipped(&mut self, s: &str) {
        if self.truncated {
            return;
        }
        let room = self.remaining();
        let mut take = s.len();
        if take > room {
            take = room;
            while !s.is_char_boundary(take) {
                take -= 1;
            }
            self.truncated = true;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
    }
}

impl<const N: usize> Default for DiagBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Write for DiagBuffer<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_clipped(s);
        Ok(())
    }
}

pub type Line = DiagBuffer<EXCEPTION_MAX_STR>;

/// `name+0xoff` when a symbol covers `addr`, the bare address otherwise.
pub fn write_symbol<const N: usize>(buf: &mut DiagBuffer<N>, addr: u64, symbol: Option<Symbol<'_>>) -> usize {
    match symbol {
        Some(sym) => buf.append(format_args!("{}+{:#x}", sym.name, addr.wrapping_sub(sym.base))),
        None => buf.append(format_args!("{:#x}", addr)),
    }
}

fn write_headline(buf: &mut Line, report: &Report, nip: u64) {
    match *report {
        Report::SystemReset { fatal: true } => {
            buf.append(format_args!("Fatal System Reset at {:016x}   ", nip))
        }
        Report::SystemReset { fatal: false } => {
            buf.append(format_args!("System Reset at {:016x}   ", nip))
        }
        Report::RecoverableMachineCheck => {
            buf.append(format_args!("Recoverable MCE with VM on at {:016x}   ", nip))
        }
        Report::MachineCheck => buf.append(format_args!("Fatal MCE at {:016x}   ", nip)),
        Report::Storage { store, dar } => buf.append(format_args!(
            "Fatal {} address {:016x} at {:016x}   ",
            if store { "store" } else { "load" },
            dar,
            nip
        )),
        Report::Segment { dar } => buf.append(format_args!(
            "Fatal load/store address {:016x} at {:016x}   ",
            dar, nip
        )),
        Report::Ifetch => buf.append(format_args!("Fatal ifetch at {:016x}   ", nip)),
        Report::Unknown { vector } => {
            buf.append(format_args!("Fatal Exception {:#x} at {:016x}  ", vector, nip))
        }
    };
}

/// One summary line: headline, symbol for `nip`, then the machine state.
pub fn summary(report: &Report, nip: u64, msr: u64, symbol: Option<Symbol<'_>>) -> Line {
    let mut buf = Line::new();
    write_headline(&mut buf, report, nip);
    write_symbol(&mut buf, nip, symbol);
    buf.append(format_args!("  MSR {:016x}", msr));
    buf
}

fn emit(sink: &mut dyn DiagSink, args: fmt::Arguments<'_>) {
    let mut buf = Line::new();
    buf.append(args);
    sink.line(buf.as_str());
}

pub fn banner(sink: &mut dyn DiagSink) {
    sink.line(BANNER);
}

pub fn dump_regs(ctx: &TrapContext, sink: &mut dyn DiagSink) {
    emit(sink, format_args!("CFAR : {:016x} MSR  : {:016x}", ctx.cfar, ctx.msr));
    emit(sink, format_args!("SRR0 : {:016x} SRR1 : {:016x}", ctx.srr0, ctx.srr1));
    emit(sink, format_args!("HSRR0: {:016x} HSRR1: {:016x}", ctx.hsrr0, ctx.hsrr1));
    emit(sink, format_args!("DSISR: {:08x}         DAR  : {:016x}", ctx.dsisr, ctx.dar));
    emit(sink, format_args!("LR   : {:016x} CTR  : {:016x}", ctx.lr, ctx.ctr));
    emit(sink, format_args!("CR   : {:08x}         XER  : {:08x}", ctx.cr, ctx.xer));

    for (row, regs) in ctx.gpr.chunks(REGS_PER_LINE).enumerate() {
        let mut buf = Line::new();
        for (col, val) in regs.iter().enumerate() {
            let sep = if col == 0 { "" } else { " " };
            buf.append(format_args!("{}GPR{:02}: {:016x}", sep, row * REGS_PER_LINE + col, val));
        }
        sink.line(buf.as_str());
    }
}

/// Raw SRR/DSISR/DAR values read straight from the core, for traps taken
/// without a saved context.
pub fn dump_sprs(srr0: u64, srr1: u64, dsisr: u32, dar: u64, sink: &mut dyn DiagSink) {
    emit(sink, format_args!("SRR0 : {:016x} SRR1 : {:016x}", srr0, srr1));
    emit(sink, format_args!("DSISR: {:08x}         DAR  : {:016x}", dsisr, dar));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Lines(Vec<String>);

    impl DiagSink for Lines {
        fn line(&mut self, text: &str) {
            self.0.push(text.to_string());
        }
    }

    #[test]
    fn buffer_clips_at_capacity() {
        let mut buf = DiagBuffer::<8>::new();
        assert_eq!(buf.append(format_args!("{}", "0123")), 4);
        assert_eq!(buf.remaining(), 4);
        assert_eq!(buf.append(format_args!("{}", "456789")), 4);
        assert_eq!(buf.as_str(), "01234567");
        assert!(buf.truncated());
        assert_eq!(buf.append(format_args!("x")), 0);
    }

    #[test]
    fn buffer_never_splits_a_character() {
        let mut buf = DiagBuffer::<4>::new();
        buf.append(format_args!("abcé"));
        buf.append(format_args!("z"));
        assert_eq!(buf.as_str(), "abc");
    }

    #[test]
    fn store_summary_matches_console_format() {
        let line = summary(
            &Report::Storage { store: true, dar: 0xdead_0000 },
            0x3004,
            0x9000_0000_0000_1033,
            Some(Symbol { name: "copy_page", base: 0x3000 }),
        );
        assert_eq!(
            line.as_str(),
            "Fatal store address 00000000dead0000 at 0000000000003004   copy_page+0x4  MSR 9000000000001033"
        );
    }

    #[test]
    fn missing_symbol_falls_back_to_address() {
        let line = summary(&Report::Unknown { vector: 0x1234 }, 0x30000, 0x1002, None);
        assert_eq!(
            line.as_str(),
            "Fatal Exception 0x1234 at 0000000000030000  0x30000  MSR 0000000000001002"
        );
    }

    #[test]
    fn dump_has_fixed_shape() {
        let mut ctx = TrapContext::new(0x300);
        for (i, r) in ctx.gpr.iter_mut().enumerate() {
            *r = i as u64;
        }
        ctx.dsisr = 0x0200_0000;
        let mut out = Lines::default();
        dump_regs(&ctx, &mut out);
        assert_eq!(out.0.len(), 6 + 8);
        assert_eq!(out.0[3], "DSISR: 02000000         DAR  : 0000000000000000");
        assert_eq!(
            out.0[13],
            "GPR28: 000000000000001c GPR29: 000000000000001d GPR30: 000000000000001e GPR31: 000000000000001f"
        );
    }

    proptest! {
        #[test]
        fn summary_fits_for_any_symbol(name in "\\PC{0,400}", nip in any::<u64>(), base in any::<u64>(), present in any::<bool>()) {
            let symbol = present.then_some(Symbol { name: &name, base });
            let line = summary(&Report::Storage { store: false, dar: nip }, nip, 0, symbol);
            prop_assert!(line.len() <= EXCEPTION_MAX_STR);
            prop_assert!(line.as_str().starts_with("Fatal load address "));
        }
    }
}
