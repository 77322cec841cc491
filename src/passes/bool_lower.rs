// This module implements the Boolean lowering engine. Given a triple in Boolean
// context, a desired branch sense and a jump target, it rewrites the triple and
// its operand sub-graph in place so control reaches the target exactly when the
// triple's Boolean value equals the sense. Negated opcodes flip the sense and
// emit nothing. Truth tests become a jump after the test (or collapse into a
// jump-and-set when they test the current truth value directly). Relational
// operators become their canonical compare followed by a jump whose polarity
// comes from a fixed per-relation table. Short-circuit AND/OR recurse into both
// operands, routing the left operand either to the target or past the right
// operand depending on the connective's dominant value. Full-evaluation AND/OR
// keep both operands as values and test the combined result once. Triples are
// retired to Noop rather than unlinked because operands and jump targets may
// still name their position. Lowering runs before reference resolution and
// does not maintain backpointers.

//! Boolean lowering: rewrite Boolean expressions into conditional jump chains.

use crate::core::compiler::{CompileContext, FullBool};
use crate::core::opcode::Opcode;
use crate::core::triple::{Operand, TripleGraph, TripleId};

/// Rewrites Boolean-context triples of one compile unit.
pub struct BoolLowering<'c, 'arena> {
    ctx: &'c mut CompileContext<'arena>,
}

impl<'c, 'arena> BoolLowering<'c, 'arena> {
    pub fn new(ctx: &'c mut CompileContext<'arena>) -> Self {
        Self { ctx }
    }

    fn graph(&mut self) -> &mut TripleGraph {
        &mut self.ctx.graph
    }

    /// Lower `t` so control reaches `target` when its value equals `sense`
    /// and falls through otherwise.
    ///
    /// # Panics
    /// If `t` is not a Boolean opcode or an operand that must be a Boolean
    /// sub-expression is missing.
    pub fn lower(&mut self, t: TripleId, sense: bool, target: TripleId) {
        use Opcode::*;

        let mut op = self.ctx.graph[t].opcode;
        let info = op.info();
        assert!(info.boolean, "{t} ({op}) reached Boolean lowering");
        let sense = if info.negated { !sense } else { sense };

        if self.ctx.options.full_bool == FullBool::Ext {
            if let Some(full) = op.to_full_eval() {
                log::trace!("{t}: {op} evaluates both operands");
                self.graph()[t].opcode = full;
                op = full;
            }
        }

        log::trace!("lower {t} ({op}) sense={sense} target={target}");
        match op {
            CoBool => self.truth_test(t, sense, target),
            SCoBool => {
                self.insert_jump(t, if sense { JmpNeq } else { JmpEqu }, target);
                self.graph()[t].opcode = CoBool;
            }
            Com => {
                let inner = self.operand(t, 0);
                self.lower(inner, !sense, target);
                let g = self.graph();
                g[t].opcode = Noop;
                g[t].operands[0] = Operand::Empty;
            }
            Equ | NEqu => self.relop(t, Equ, if sense { JmpNeq } else { JmpEqu }, target),
            Pattern | NPattern => self.relop(t, Pattern, if sense { JmpNeq } else { JmpEqu }, target),
            Follow | NFollow => self.relop(t, Follow, if sense { JmpGtr } else { JmpLeq }, target),
            SortsAfter | NSortsAfter => {
                self.relop(t, SortsAfter, if sense { JmpGtr } else { JmpLeq }, target)
            }
            Contain | NContain => self.relop(t, Contain, if sense { JmpNeq } else { JmpEqu }, target),
            Gt | NGt => self.relop(t, NumCmp, if sense { JmpGtr } else { JmpLeq }, target),
            Lt | NLt => self.relop(t, NumCmp, if sense { JmpLss } else { JmpGeq }, target),
            And | NAnd => self.boolop(t, false, sense, target),
            Or | NOr => self.boolop(t, true, sense, target),
            SAnd | SNAnd => self.sboolop(t, SAnd, sense, target),
            SOr | SNOr => self.sboolop(t, SOr, sense, target),
            other => unreachable!("{t}: {other} is tagged Boolean but has no lowering"),
        }
    }

    /// Truth test of a value. Testing the current truth value directly
    /// collapses into a jump on it.
    fn truth_test(&mut self, t: TripleId, sense: bool, target: TripleId) {
        let inner = self.operand(t, 0);
        let g = self.graph();
        if g[inner].opcode == Opcode::GetTruth {
            assert!(
                g[inner].operands[0].is_empty(),
                "truth fetch {inner} carries an operand"
            );
            g[inner].opcode = Opcode::Noop;
            g[t].opcode = if sense { Opcode::JmpTSet } else { Opcode::JmpTClr };
            g[t].operands = [Operand::Jump(target), Operand::Empty];
            log::trace!("{t}: truth test of {inner} became {}", g[t].opcode);
            return;
        }
        self.insert_jump(t, if sense { Opcode::JmpNeq } else { Opcode::JmpEqu }, target);
    }

    fn relop(&mut self, t: TripleId, compare: Opcode, jump: Opcode, target: TripleId) {
        self.graph()[t].opcode = compare;
        self.insert_jump(t, jump, target);
    }

    /// Short-circuit connective with dominant value `dominant` (false for AND,
    /// true for OR): once the left operand has that value the right operand is
    /// never evaluated.
    fn boolop(&mut self, t: TripleId, dominant: bool, sense: bool, target: TripleId) {
        let left = self.operand(t, 0);
        let right = self.operand(t, 1);

        // The connective's own position follows the right operand's chain, so
        // jumping to it skips the right operand.
        let left_target = if dominant == sense { target } else { t };
        self.lower(left, dominant, left_target);
        self.lower(right, sense, target);
        self.graph().retire(t);
    }

    /// Full-evaluation connective: both operands stay values and the combined
    /// result is tested once.
    fn sboolop(&mut self, t: TripleId, base: Opcode, sense: bool, target: TripleId) {
        self.graph()[t].opcode = base;
        for slot in 0..2 {
            let operand = self.operand(t, slot);
            self.convert_to_full(operand);
        }

        let g = self.graph();
        let test = g.make(Opcode::CoBool);
        g[test].operands[0] = Operand::Triple(t);
        g.insert_after(t, test);
        log::trace!("{t}: full evaluation tested by {test}");
        self.lower(test, sense, target);
    }

    /// Turn nested short-circuit connectives below a full-evaluation node into
    /// their full-evaluation forms.
    fn convert_to_full(&mut self, id: TripleId) {
        let op = self.ctx.graph[id].opcode;
        let op = match op.to_full_eval() {
            Some(full) => {
                self.graph()[id].opcode = full;
                full
            }
            None => op,
        };
        if matches!(op, Opcode::SAnd | Opcode::SNAnd | Opcode::SOr | Opcode::SNOr | Opcode::Com) {
            let operands = self.ctx.graph[id].operands;
            for operand in operands {
                if let Operand::Triple(inner) = operand {
                    self.convert_to_full(inner);
                }
            }
        }
    }

    fn insert_jump(&mut self, after: TripleId, jump: Opcode, target: TripleId) -> TripleId {
        debug_assert!(jump.is_jump());
        let g = self.graph();
        let j = g.make(jump);
        g[j].operands[0] = Operand::Jump(target);
        g.insert_after(after, j);
        self.ctx.stats.jumps_synthesized += 1;
        j
    }

    fn operand(&self, t: TripleId, slot: usize) -> TripleId {
        match self.ctx.graph[t].operands[slot] {
            Operand::Triple(id) => id,
            other => panic!(
                "{t} ({}) has {other} where a Boolean operand is expected",
                self.ctx.graph[t].opcode
            ),
        }
    }
}
