use crate::context::Spr;
use crate::diag::{self, DiagSink, Line};
use crate::trap::Platform;
use log::debug;

/// System reset taken in a power-saving state: report it and return to the
/// wakeup path. There is no register snapshot for sleep entries.
pub fn pm_sreset(platform: &mut dyn Platform, sink: &mut dyn DiagSink) {
    debug!("system reset taken in power-saving state");
    diag::banner(sink);
    let mut buf = Line::new();
    buf.append(format_args!("System Reset in sleep"));
    sink.line(buf.as_str());
    platform.backtrace(sink);
}

/// Machine check taken in a power-saving state. Only what the core still
/// holds in its SPRs is reported; there is nothing to recover into.
pub fn pm_mce(platform: &mut dyn Platform, sink: &mut dyn DiagSink) -> ! {
    diag::banner(sink);
    let mut buf = Line::new();
    buf.append(format_args!("Fatal MCE in sleep"));
    sink.line(buf.as_str());
    diag::dump_sprs(
        platform.read_spr(Spr::Srr0),
        platform.read_spr(Spr::Srr1),
        platform.read_spr(Spr::Dsisr) as u32,
        platform.read_spr(Spr::Dar),
        sink,
    );
    platform.halt()
}
