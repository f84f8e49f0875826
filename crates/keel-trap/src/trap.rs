use crate::context::Spr;
use crate::diag::DiagSink;

/// Virtual memory layer hooks that try to repair a faulting translation.
/// Each returns `true` when the access can simply be retried.
pub trait FaultDelegate {
    /// Data storage interrupt at `dar`
    fn dsi(&mut self, nip: u64, dar: u64, store: bool) -> bool;

    /// Data segment miss at `dar`
    fn dslb(&mut self, nip: u64, dar: u64) -> bool;

    /// Instruction storage interrupt
    fn isi(&mut self, nip: u64) -> bool;

    /// Instruction segment miss
    fn islb(&mut self, nip: u64) -> bool;
}

/// A symbol covering an address: `name` starts at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol<'a> {
    pub name: &'a str,
    pub base: u64,
}

/// Services the trap path borrows from the rest of the firmware image.
pub trait Platform {
    /// Stop the whole firmware image. Never returns.
    fn halt(&mut self) -> !;

    /// Best-effort call stack dump of the interrupted code
    fn backtrace(&mut self, sink: &mut dyn DiagSink);

    fn symbol(&self, addr: u64) -> Option<Symbol<'_>>;

    /// Read a special purpose register directly from the core
    fn read_spr(&self, spr: Spr) -> u64;
}

/// Nearest symbol at or below `addr` in a `(base, name)` table sorted by base,
/// e.g. one generated from the image's symbol map.
pub fn nearest_symbol<S: AsRef<str>>(entries: &[(u64, S)], addr: u64) -> Option<Symbol<'_>> {
    let idx = entries.partition_point(|(base, _)| *base <= addr);
    let (base, name) = entries.get(idx.checked_sub(1)?)?;
    Some(Symbol {
        name: name.as_ref(),
        base: *base,
    })
}
