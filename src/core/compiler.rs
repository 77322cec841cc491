// This module implements the compilation driver of the triple back end. Compiler
// owns the state that outlives a single compile: the two string pools, the
// compile options and the code emitter. A compile runs in two halves. The first
// half enters the pool mode matching the kind of code being compiled, creates a
// CompileContext borrowing the active arena, and hands it to the front end (a
// closure that builds the triple graph and lowers Boolean-context triples as it
// discovers them). The second half, finish, is the finalizer: it rejects trailing
// input, appends the return triple, resolves references, runs the temporary
// allocator and hands the graph to the emitter. Whatever the outcome, the pools
// go back to Normal mode with the indirect arena released and the code-gen phase
// returns to NoState. Every per-unit structure (graph, slot table, statistics)
// lives in the CompileContext, so a unit never observes another unit's state.

//! Compilation driver and finalizer.
//!
//! ```ignore
//! let mut compiler = Compiler::new(CompileOptions::default(), ListingEmitter::new());
//! let object = compiler.compile(CompileKind::Normal, "", |ctx, _src| {
//!     let lit = ctx.graph.push(Opcode::Lit);
//!     Ok(Parsed::returning(0, Operand::Triple(lit)))
//! })?;
//! ```

use super::emitter::CodeEmitter;
use super::error::{CompileError, CompileResult};
use super::opcode::Opcode;
use super::session::{LiteralPool, PoolMode, SessionStats, StringPools};
use super::triple::{Operand, TripleGraph, TripleId};
use crate::passes::bool_lower::BoolLowering;
use crate::passes::temp_alloc::{TempAllocator, TempLayout};
use bumpalo::Bump;
use std::fmt;

/// Full Boolean evaluation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullBool {
    /// Short-circuit evaluation.
    #[default]
    Standard,
    /// Full evaluation requested by the front end for expressions with side effects.
    Full,
    /// Every AND/OR evaluates both operands.
    Ext,
}

/// Options controlling one compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Stores of literal values become literal stores.
    pub inline_literals: bool,
    pub full_bool: FullBool,
    /// Line-entry markers are emitted for every line.
    pub line_entry: bool,
    /// Number of variable slots the front end reserved.
    pub var_count: u32,
    /// Ceiling of simultaneously live temporaries per class.
    pub max_temps: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inline_literals: true,
            full_bool: FullBool::Standard,
            line_entry: true,
            var_count: 0,
            max_temps: super::temp_file::MAX_TEMP_COUNT,
        }
    }
}

impl CompileOptions {
    pub fn with_inline_literals(mut self, on: bool) -> Self {
        self.inline_literals = on;
        self
    }

    pub fn with_full_bool(mut self, mode: FullBool) -> Self {
        self.full_bool = mode;
        self
    }

    pub fn with_line_entry(mut self, on: bool) -> Self {
        self.line_entry = on;
        self
    }

    pub fn with_var_count(mut self, count: u32) -> Self {
        self.var_count = count;
        self
    }

    pub fn with_max_temps(mut self, limit: usize) -> Self {
        self.max_temps = limit;
        self
    }
}

/// What kind of code is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileKind {
    /// A routine.
    Normal,
    /// Code built at run time.
    Indirect,
}

/// Code-generation phase of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgPhase {
    NoState,
    Parse,
    Resolve,
    Allocate,
    Emit,
}

impl fmt::Display for CgPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CgPhase::NoState => "no-state",
            CgPhase::Parse => "parse",
            CgPhase::Resolve => "resolve",
            CgPhase::Allocate => "allocate",
            CgPhase::Emit => "emit",
        };
        f.write_str(name)
    }
}

/// Per-unit compile state.
pub struct CompileContext<'arena> {
    pub graph: TripleGraph,
    pub literals: LiteralPool<'arena>,
    pub options: CompileOptions,
    pub stats: SessionStats,
}

impl<'arena> CompileContext<'arena> {
    pub fn new(arena: &'arena Bump, options: CompileOptions) -> Self {
        Self {
            graph: TripleGraph::new(),
            literals: LiteralPool::new(arena),
            options,
            stats: SessionStats::default(),
        }
    }

    /// Append a literal triple holding `text`.
    pub fn push_literal(&mut self, text: &str) -> TripleId {
        let lit = self.literals.intern(text);
        let id = self.graph.push(Opcode::Lit);
        self.graph[id].operands[0] = Operand::Mlit(lit);
        id
    }

    /// Rewrite Boolean-context triple `t` into a jump chain reaching `target`
    /// exactly when its value equals `sense`.
    pub fn lower_bool(&mut self, t: TripleId, sense: bool, target: TripleId) {
        BoolLowering::new(self).lower(t, sense, target);
    }
}

/// Front-end result handed to the finalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parsed {
    /// Bytes of the source the front end consumed.
    pub consumed: usize,
    /// Returned operand, if the unit returns a value.
    pub ret: Option<Operand>,
}

impl Parsed {
    pub fn new(consumed: usize) -> Self {
        Self { consumed, ret: None }
    }

    pub fn returning(consumed: usize, value: Operand) -> Self {
        Self {
            consumed,
            ret: Some(value),
        }
    }
}

/// A committed compile result.
#[derive(Debug, Clone)]
pub struct Object {
    pub code: Vec<u8>,
    pub layout: TempLayout,
    pub stats: SessionStats,
}

impl Object {
    /// The code as text, for textual emitters.
    pub fn listing(&self) -> Option<&str> {
        std::str::from_utf8(&self.code).ok()
    }
}

/// Compilation driver.
pub struct Compiler<E: CodeEmitter> {
    pools: StringPools,
    options: CompileOptions,
    emitter: E,
    phase: CgPhase,
}

impl<E: CodeEmitter> Compiler<E> {
    pub fn new(options: CompileOptions, emitter: E) -> Self {
        Self {
            pools: StringPools::new(),
            options,
            emitter,
            phase: CgPhase::NoState,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CompileOptions {
        &mut self.options
    }

    pub fn phase(&self) -> CgPhase {
        self.phase
    }

    pub fn pools(&self) -> &StringPools {
        &self.pools
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Compile one unit.
    ///
    /// `front_end` builds the triple graph from `source` and reports how much
    /// of it was consumed. On failure no object is produced; in every case the
    /// pools are back in Normal mode and the phase is NoState on return.
    pub fn compile<F>(&mut self, kind: CompileKind, source: &str, front_end: F) -> CompileResult<Object>
    where
        F: FnOnce(&mut CompileContext<'_>, &str) -> CompileResult<Parsed>,
    {
        let mode = match kind {
            CompileKind::Normal => PoolMode::Normal,
            CompileKind::Indirect => PoolMode::Indirect,
        };
        self.pools.enter(mode);
        self.phase = CgPhase::Parse;
        log::debug!("compile start: {:?} unit, {} bytes of source", kind, source.len());

        let result = {
            let mut ctx = CompileContext::new(self.pools.active(), self.options.clone());
            match front_end(&mut ctx, source) {
                Ok(parsed) => Self::finish(&mut self.emitter, &mut self.phase, &mut ctx, source, parsed),
                Err(err) => Err(err),
            }
        };

        match &result {
            Ok(object) => log::debug!(
                "compile committed: {} bytes of code, {} bytes of temporaries",
                object.code.len(),
                object.layout.region_size()
            ),
            Err(err) => log::debug!("compile failed during {}: {}", self.phase, err),
        }

        self.pools.restore();
        self.phase = CgPhase::NoState;
        result
    }

    fn finish(
        emitter: &mut E,
        phase: &mut CgPhase,
        ctx: &mut CompileContext<'_>,
        source: &str,
        parsed: Parsed,
    ) -> CompileResult<Object> {
        let rest = match source.get(parsed.consumed..) {
            Some(rest) => rest,
            None if parsed.consumed >= source.len() => "",
            // Stopped inside a character.
            None => {
                return Err(CompileError::ExtraChars {
                    column: parsed.consumed,
                })
            }
        };
        let tail = rest.trim_start_matches(' ');
        if !tail.is_empty() {
            return Err(CompileError::ExtraChars {
                column: source.len() - tail.len(),
            });
        }

        *phase = CgPhase::Resolve;
        let ret = match parsed.ret {
            Some(value) => {
                let id = ctx.graph.push(Opcode::RetArg);
                ctx.graph[id].operands[0] = value;
                id
            }
            None => ctx.graph.push(Opcode::Ret),
        };
        log::trace!("appended {} {}", ctx.graph[ret].opcode, ret);
        ctx.graph.resolve_refs();

        *phase = CgPhase::Allocate;
        let layout = TempAllocator::new(ctx).run()?;

        *phase = CgPhase::Emit;
        let code = emitter.emit(ctx, &layout)?;

        Ok(Object {
            code,
            layout,
            stats: ctx.stats.clone(),
        })
    }
}
