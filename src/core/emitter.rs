// This module defines the boundary between the back end and code emission. The
// CodeEmitter trait receives the finished compile unit after temporary allocation
// (every value-producing triple with consumers has a concrete destination) along
// with the temporary layout, and returns the bytes of the object to commit. The
// binary emitter of a production system plugs in here; the crate ships
// ListingEmitter, which serialises the execution order as one line per triple
// followed by the layout, and is what the tests and the tripc driver inspect.
// The listing writer is shared with the TIR FileCheck harness so that checks run
// against exactly what an emitter would see.

//! Code emitter boundary and the textual listing emitter.

use super::compiler::CompileContext;
use super::error::{CompileError, CompileResult};
use super::opcode::Opcode;
use super::session::LiteralPool;
use super::triple::{Operand, TripleGraph, TripleId};
use crate::passes::temp_alloc::TempLayout;
use std::fmt::{self, Write};

/// Consumer of an allocated compile unit.
pub trait CodeEmitter {
    /// Produce the object code of `ctx`. Called exactly once per successful unit.
    fn emit(&mut self, ctx: &CompileContext<'_>, layout: &TempLayout) -> CompileResult<Vec<u8>>;
}

/// Emits a textual listing of the execution order.
#[derive(Debug, Default, Clone)]
pub struct ListingEmitter {
    show_noops: bool,
    units: usize,
}

impl ListingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include retired triples in the listing.
    pub fn with_noops(mut self, on: bool) -> Self {
        self.show_noops = on;
        self
    }

    /// Number of units emitted so far.
    pub fn units(&self) -> usize {
        self.units
    }
}

impl CodeEmitter for ListingEmitter {
    fn emit(&mut self, ctx: &CompileContext<'_>, layout: &TempLayout) -> CompileResult<Vec<u8>> {
        let mut out = String::new();
        write_listing(&mut out, &ctx.graph, &ctx.literals, self.show_noops)
            .and_then(|_| writeln!(out, "; {layout}"))
            .map_err(|e| CompileError::Emit {
                reason: e.to_string(),
            })?;
        self.units += 1;
        log::trace!("listing emitter wrote unit {} ({} bytes)", self.units, out.len());
        Ok(out.into_bytes())
    }
}

/// Write one line per linked triple in execution order.
pub fn write_listing<W: Write>(
    out: &mut W,
    graph: &TripleGraph,
    literals: &LiteralPool<'_>,
    show_noops: bool,
) -> fmt::Result {
    for id in graph.exec_order() {
        if graph[id].opcode == Opcode::Noop && !show_noops {
            continue;
        }
        write_triple(out, graph, literals, id)?;
        out.write_char('\n')?;
    }
    Ok(())
}

/// Write a single triple, e.g. `t4: add %t2, %t3 -> val[0]`.
pub fn write_triple<W: Write>(
    out: &mut W,
    graph: &TripleGraph,
    literals: &LiteralPool<'_>,
    id: TripleId,
) -> fmt::Result {
    let t = &graph[id];
    write!(out, "{id}: {}", t.opcode)?;
    let used = match t.operands {
        [Operand::Empty, Operand::Empty] => 0,
        [_, Operand::Empty] => 1,
        _ => 2,
    };
    for (i, op) in t.operands.iter().take(used).enumerate() {
        out.write_str(if i == 0 { " " } else { ", " })?;
        write_operand(out, literals, op)?;
    }
    if !t.destination.is_empty() {
        out.write_str(" -> ")?;
        write_operand(out, literals, &t.destination)?;
    }
    Ok(())
}

fn write_operand<W: Write>(out: &mut W, literals: &LiteralPool<'_>, op: &Operand) -> fmt::Result {
    match op {
        Operand::Mlit(lit) => write!(out, "{:?}", literals.get(*lit)),
        other => write!(out, "{other}"),
    }
}
