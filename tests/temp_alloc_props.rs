//! Property-based tests for temporary allocation.
//!
//! Random straight-line units are allocated and checked for:
//! 1. No two values whose lifetimes overlap share a slot
//! 2. Per-class counts equal the highest slot handed out plus one
//! 3. Every backpointer is consumed by the end of the scan

use bumpalo::Bump;
use proptest::prelude::*;
use tribe::{
    CompileContext, CompileOptions, Opcode, Operand, TempAllocator, TempClass, TempSlot, TripleId,
};

// -- Unit Generation --

/// One generated statement: an opcode selector and two operand picks.
fn step_strategy() -> impl Strategy<Value = (u8, usize, usize)> {
    (0u8..5, any::<usize>(), any::<usize>())
}

/// Build a unit from `steps`; returns the triples in execution order.
fn build(ctx: &mut CompileContext<'_>, steps: &[(u8, usize, usize)]) -> Vec<TripleId> {
    let mut values = vec![ctx.push_literal("1"), ctx.push_literal("ab")];
    for &(kind, a, b) in steps {
        let a = values[a % values.len()];
        let b = values[b % values.len()];
        let (opcode, operands) = match kind {
            0 => (Opcode::Add, [Operand::Triple(a), Operand::Triple(b)]),
            1 => (Opcode::Cat, [Operand::Triple(a), Operand::Triple(b)]),
            2 => (Opcode::FnLength, [Operand::Triple(a), Operand::Empty]),
            3 => (Opcode::Equ, [Operand::Triple(a), Operand::Triple(b)]),
            _ => (Opcode::Write, [Operand::Triple(a), Operand::Triple(b)]),
        };
        let id = ctx.graph.push(opcode);
        ctx.graph[id].operands = operands;
        if opcode != Opcode::Write {
            values.push(id);
        }
    }
    let last = values[values.len() - 1];
    let ret = ctx.graph.push(Opcode::RetArg);
    ctx.graph[ret].operands[0] = Operand::Triple(last);
    ctx.graph.exec_order().collect()
}

proptest! {
    #[test]
    fn prop_live_values_never_share_a_slot(steps in prop::collection::vec(step_strategy(), 1..80)) {
        let arena = Bump::new();
        let mut ctx = CompileContext::new(&arena, CompileOptions::default());
        let order = build(&mut ctx, &steps);

        // Position of the last reader of every triple, before allocation
        // consumes the backpointers.
        let mut last_use = vec![None; ctx.graph.len()];
        for (pos, &id) in order.iter().enumerate() {
            for op in ctx.graph[id].operands {
                if let Operand::Triple(p) = op {
                    last_use[p.index()] = Some(pos);
                }
            }
        }

        ctx.graph.resolve_refs();
        let layout = TempAllocator::new(&mut ctx).run().unwrap();

        let mut ranges: Vec<(TempSlot, usize, usize)> = Vec::new();
        let mut highest = [None::<u32>; TempClass::COUNT];
        for (pos, &id) in order.iter().enumerate() {
            prop_assert!(ctx.graph[id].backptrs.is_empty());
            if let Operand::Temp(slot) = ctx.graph[id].destination {
                let end = last_use[id.index()].expect("allocated value has a reader");
                ranges.push((slot, pos, end));
                let h = &mut highest[slot.class.index()];
                *h = Some(h.map_or(slot.index, |h: u32| h.max(slot.index)));
            }
        }

        for (i, &(slot, start, end)) in ranges.iter().enumerate() {
            for &(other, other_start, other_end) in &ranges[i + 1..] {
                if slot == other {
                    prop_assert!(
                        other_start > end || start > other_end,
                        "{slot} shared by overlapping lifetimes"
                    );
                }
            }
        }

        for class in TempClass::ALL {
            let expected = highest[class.index()].map_or(0, |h| h + 1);
            prop_assert_eq!(layout.count(class), expected);
        }
    }

    #[test]
    fn prop_ceiling_bounds_every_class(steps in prop::collection::vec(step_strategy(), 1..40), limit in 1usize..6) {
        let arena = Bump::new();
        let mut ctx = CompileContext::new(&arena, CompileOptions::default().with_max_temps(limit));
        build(&mut ctx, &steps);
        ctx.graph.resolve_refs();

        match TempAllocator::new(&mut ctx).run() {
            Ok(layout) => {
                for class in TempClass::ALL {
                    prop_assert!(layout.count(class) as usize <= limit);
                }
            }
            Err(err) => {
                let is_ceiling = matches!(err, tribe::CompileError::TempStoreMax { limit: l, .. } if l == limit);
                prop_assert!(is_ceiling, "unexpected error {}", err);
            }
        }
    }
}
