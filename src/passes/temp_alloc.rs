// This module implements the temporary allocator. It makes a single pass over the
// execution order of a resolved compile unit. Before allocation it applies the
// opcode-specific cleanups: redundant line markers become no-ops, line boundaries
// drop every live full-value temporary, fetches whose count equals the variable
// bound are normalised, pass-through wrappers are retired after releasing the
// triple they wrap, stores of literals become literal stores and save-target
// markers without consumers disappear. A value-producing triple with consumers
// then either writes straight into a variable (when its only consumer is a
// store into that variable, which is folded away) or receives the lowest free
// slot of its class. Finally every triple operand of the triple releases one
// backpointer of its producer, and a producer left without consumers gives its
// slot back, so slots are reused as soon as their last reader has been
// processed. Backpointer lists are the use counts; no liveness analysis runs.
// After the scan the per-class high-water marks give the slot counts and the
// byte layout of the temporary region.

//! Temporary allocation over a resolved triple graph.

use crate::core::compiler::CompileContext;
use crate::core::emitter::write_triple;
use crate::core::error::{CompileError, CompileResult};
use crate::core::opcode::{OpInfo, Opcode, ValueKind};
use crate::core::temp_file::TempFile;
use crate::core::triple::{Operand, TempClass, TempSlot, TripleId};
use std::fmt;

/// Slot counts and byte offsets of the temporary classes.
///
/// The variable class has a region of its own. The remaining classes share one
/// contiguous region in the order Val, Int, ValAddr, CodeAddr; `offsets` holds
/// the end of each class within its region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TempLayout {
    pub counts: [u32; TempClass::COUNT],
    pub offsets: [u32; TempClass::COUNT],
}

/// Alignment of class boundaries within the temporary region.
const REGION_ALIGN: u32 = 8;

fn round_up(n: u32, align: u32) -> u32 {
    (n + align - 1) & !(align - 1)
}

impl TempLayout {
    pub fn from_counts(counts: [u32; TempClass::COUNT]) -> Self {
        let bytes = |class: TempClass| counts[class.index()] * class.size();
        let mut offsets = [0; TempClass::COUNT];

        offsets[TempClass::Var.index()] = bytes(TempClass::Var);
        let mut size = bytes(TempClass::Val);
        offsets[TempClass::Val.index()] = size;
        size += round_up(bytes(TempClass::Int), REGION_ALIGN);
        offsets[TempClass::Int.index()] = size;
        size += bytes(TempClass::ValAddr);
        offsets[TempClass::ValAddr.index()] = size;
        size += bytes(TempClass::CodeAddr);
        offsets[TempClass::CodeAddr.index()] = size;

        Self { counts, offsets }
    }

    pub fn count(&self, class: TempClass) -> u32 {
        self.counts[class.index()]
    }

    /// End of `class` within its region.
    pub fn offset(&self, class: TempClass) -> u32 {
        self.offsets[class.index()]
    }

    /// Start of `class` within its region.
    pub fn start(&self, class: TempClass) -> u32 {
        match class {
            TempClass::Var | TempClass::Val => 0,
            TempClass::Int => self.offset(TempClass::Val),
            TempClass::ValAddr => self.offset(TempClass::Int),
            TempClass::CodeAddr => self.offset(TempClass::ValAddr),
        }
    }

    /// Byte offset of `slot` within its region.
    pub fn slot_offset(&self, slot: TempSlot) -> u32 {
        self.start(slot.class) + slot.index * slot.class.size()
    }

    /// Size of the shared temporary region.
    pub fn region_size(&self) -> u32 {
        self.offset(TempClass::CodeAddr)
    }

    /// Size of the variable region.
    pub fn var_region_size(&self) -> u32 {
        self.offset(TempClass::Var)
    }
}

impl fmt::Display for TempLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("temps")?;
        for class in TempClass::ALL {
            write!(f, " {}={}", class, self.count(class))?;
        }
        write!(f, "; vars {} bytes, temps {} bytes", self.var_region_size(), self.region_size())
    }
}

/// Temporary class holding results of the given kind.
fn classify(t: TripleId, opcode: Opcode, info: &OpInfo) -> TempClass {
    match (info.value, info.mv_addr) {
        (ValueKind::Mval, false) => TempClass::Val,
        (ValueKind::Mint | ValueKind::Bool, false) => TempClass::Int,
        (ValueKind::Mval, true) => TempClass::ValAddr,
        (ValueKind::CodeAddr, false) => TempClass::CodeAddr,
        (kind, addr) => panic!("{t}: {opcode} result {kind:?} (address: {addr}) has no temporary class"),
    }
}

/// Single-pass temporary allocator for one compile unit.
pub struct TempAllocator<'c, 'arena> {
    ctx: &'c mut CompileContext<'arena>,
    temps: TempFile,
}

impl<'c, 'arena> TempAllocator<'c, 'arena> {
    pub fn new(ctx: &'c mut CompileContext<'arena>) -> Self {
        let temps = TempFile::new(ctx.options.max_temps, ctx.options.var_count);
        Self { ctx, temps }
    }

    pub fn temps(&self) -> &TempFile {
        &self.temps
    }

    /// Assign destinations to every linked triple and compute the layout.
    ///
    /// The graph must be resolved: every Triple operand mirrored by a backpointer.
    pub fn run(&mut self) -> CompileResult<TempLayout> {
        log::debug!("temporary allocation over {} triples", self.ctx.graph.len());
        let mut cur = self.ctx.graph.head();
        while let Some(x) = cur {
            self.visit(x)?;
            cur = self.ctx.graph.next(x);
        }

        let layout = TempLayout::from_counts(self.temps.counts());
        log::debug!("temporary allocation done: {layout}");
        Ok(layout)
    }

    fn visit(&mut self, x: TripleId) -> CompileResult<()> {
        let mut opcode = self.ctx.graph[x].opcode;
        if matches!(opcode, Opcode::Noop | Opcode::Parameter) {
            // Retired code addresses keep their slot.
            let dest = self.ctx.graph[x].destination;
            return self.reserve(x, dest);
        }
        self.ctx.stats.triples_visited += 1;
        if log::log_enabled!(log::Level::Trace) {
            let mut line = String::new();
            let _ = write_triple(&mut line, &self.ctx.graph, &self.ctx.literals, x);
            log::trace!("alloc scan {line}");
        }

        match opcode {
            Opcode::LineStart => {
                if self.redundant_line_start(x) {
                    log::trace!("{x}: redundant line start");
                    self.ctx.graph[x].opcode = Opcode::Noop;
                    self.ctx.stats.retired += 1;
                    return Ok(());
                }
                self.clear_values(x);
            }
            Opcode::LineFetch => {
                self.clear_values(x);
                self.normalize_fetch(x);
            }
            Opcode::Fetch => self.normalize_fetch(x),
            Opcode::PassThru => {
                let inner = match self.ctx.graph[x].operands[0] {
                    Operand::Triple(inner) => inner,
                    other => panic!("pass-through {x} wraps {other} instead of a triple"),
                };
                assert!(
                    self.ctx.graph[x].destination.is_empty(),
                    "pass-through {x} has a destination"
                );
                self.remove_backptr(x, inner)?;
                let g = &mut self.ctx.graph;
                g[x].opcode = Opcode::Noop;
                g[x].operands[0] = Operand::Empty;
                self.ctx.stats.retired += 1;
                return Ok(());
            }
            Opcode::Sto => {
                let g = &mut self.ctx.graph;
                if let Operand::Triple(src) = g[x].operands[1] {
                    if self.ctx.options.inline_literals && g[src].opcode == Opcode::Lit {
                        g[x].opcode = Opcode::StoLit;
                        opcode = Opcode::StoLit;
                        self.ctx.stats.literal_stores += 1;
                    }
                }
            }
            Opcode::GvSavTarg => {
                let t = &self.ctx.graph[x];
                if !t.has_consumers() && t.destination.is_empty() {
                    log::trace!("{x}: save target without restores");
                    self.ctx.graph[x].opcode = Opcode::Noop;
                    opcode = Opcode::Noop;
                    self.ctx.stats.retired += 1;
                }
            }
            _ => {}
        }

        match self.ctx.graph[x].destination {
            Operand::Empty => {
                let info = opcode.info();
                if info.is_value() && self.ctx.graph[x].has_consumers() && !info.cg_skip {
                    match self.forwardable_store(x, &info) {
                        Some((store, var)) => self.forward_store(x, store, var),
                        None => self.assign_temp(x, opcode, &info)?,
                    }
                }
            }
            Operand::Triple(r) => {
                let dest = self.ctx.graph[r].destination;
                if dest.is_empty() {
                    // A variable without a slot is itself the final target.
                    assert!(
                        self.ctx.graph[r].opcode == Opcode::Var,
                        "{x}: destination {r} was never assigned"
                    );
                } else {
                    self.ctx.graph[x].destination = dest;
                    self.reserve(x, dest)?;
                }
            }
            dest => self.reserve(x, dest)?,
        }

        self.release_operands(x)
    }

    /// Count a slot assigned before this scan toward its class.
    fn reserve(&mut self, x: TripleId, dest: Operand) -> CompileResult<()> {
        if let Some(slot) = dest.as_temp() {
            log::trace!("{x}: keeps {slot}");
            let limit = self.temps.limit();
            self.temps.reserve(slot).map_err(|_| CompileError::TempStoreMax {
                class: slot.class,
                limit,
            })?;
        }
        Ok(())
    }

    /// A line start is dropped when another line marker follows directly, or,
    /// without line entries, when only a fetch count separates it from a line
    /// fetch.
    fn redundant_line_start(&self, x: TripleId) -> bool {
        let g = &self.ctx.graph;
        let Some(next) = g.next(x) else {
            return false;
        };
        match g[next].opcode {
            Opcode::LineStart | Opcode::LineFetch => true,
            Opcode::Ilit if !self.ctx.options.line_entry => {
                g.next_opcode(next) == Some(Opcode::LineFetch)
            }
            _ => false,
        }
    }

    /// Drop every live full-value temporary at a line boundary.
    fn clear_values(&mut self, x: TripleId) {
        let live = self.temps.clear_class(TempClass::Val);
        if live > 0 {
            log::warn!("{x}: {live} full-value temporaries still live at line boundary, cleared");
            self.ctx.stats.line_clears += live;
        }
    }

    /// A fetch of the whole variable table carries no count.
    fn normalize_fetch(&mut self, x: TripleId) {
        let g = &mut self.ctx.graph;
        let count = match g[x].operands[0] {
            Operand::Triple(c) if g[c].opcode == Opcode::Ilit => c,
            other => panic!("{x}: fetch count {other} is not an integer literal triple"),
        };
        let Ok(bound) = i32::try_from(self.ctx.options.var_count) else {
            return;
        };
        if g[count].operands[0] == Operand::Ilit(bound) {
            log::trace!("{x}: fetch of all {bound} variables");
            g[count].operands[0] = Operand::Ilit(0);
            g.clear_operand(x, 1);
        }
    }

    /// The single store consuming `x`, when it stores `x` into a variable.
    fn forwardable_store(&self, x: TripleId, info: &OpInfo) -> Option<(TripleId, TripleId)> {
        let g = &self.ctx.graph;
        if info.mv_addr {
            return None;
        }
        let &[store] = g[x].backptrs.as_slice() else {
            return None;
        };
        if g[store].opcode != Opcode::Sto || g[store].operands[1] != Operand::Triple(x) {
            return None;
        }
        match g[store].operands[0] {
            Operand::Triple(var) if g[var].opcode == Opcode::Var => Some((store, var)),
            _ => None,
        }
    }

    fn forward_store(&mut self, x: TripleId, store: TripleId, var: TripleId) {
        let g = &mut self.ctx.graph;
        g[x].destination = match g[var].destination {
            Operand::Empty => Operand::Triple(var),
            dest => dest,
        };
        g.clear_operand(store, 0);
        g.clear_operand(store, 1);
        g[store].opcode = Opcode::Noop;
        log::trace!("{x}: stored directly into {} ({store} retired)", g[x].destination);
        self.ctx.stats.stores_forwarded += 1;
        self.ctx.stats.retired += 1;
    }

    fn assign_temp(&mut self, x: TripleId, opcode: Opcode, info: &OpInfo) -> CompileResult<()> {
        let class = classify(x, opcode, info);
        let slot = self.temps.allocate(class).map_err(CompileError::from)?;
        self.ctx.stats.record_temp(class);
        let g = &mut self.ctx.graph;
        g[x].destination = Operand::Temp(slot);
        log::trace!("{x}: allocated {slot}");
        if g[x].opcode == Opcode::CdAddr {
            g[x].opcode = Opcode::Noop;
            self.ctx.stats.retired += 1;
        }
        Ok(())
    }

    /// Release every triple operand of `x`, descending into parameter chains.
    fn release_operands(&mut self, x: TripleId) -> CompileResult<()> {
        let mut owner = x;
        let mut slot = 0;
        while slot < 2 {
            if let Operand::Triple(producer) = self.ctx.graph[owner].operands[slot] {
                if self.ctx.graph[producer].opcode == Opcode::Parameter {
                    owner = producer;
                    slot = 0;
                    continue;
                }
                self.remove_backptr(owner, producer)?;
            }
            slot += 1;
        }
        Ok(())
    }

    /// Drop one backpointer of `producer` for `consumer`; the producer's slot
    /// is freed once it has no consumers left.
    fn remove_backptr(&mut self, consumer: TripleId, producer: TripleId) -> CompileResult<()> {
        let g = &mut self.ctx.graph;
        assert_ne!(
            g[producer].opcode,
            Opcode::PassThru,
            "{consumer} reads pass-through {producer}; references were not resolved"
        );
        if !g.remove_backptr(producer, consumer) || g[producer].has_consumers() {
            return Ok(());
        }
        if let Operand::Temp(slot) = g[producer].destination {
            if slot.class.recyclable() && self.temps.free(slot)? {
                log::trace!("{producer}: released {slot}");
                self.ctx.stats.temps_freed += 1;
            }
        }
        Ok(())
    }
}
