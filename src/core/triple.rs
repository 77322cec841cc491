// This module implements the triple graph: the mutable intermediate representation
// both back-end passes work on. Triples live in a single arena (a Vec) and are
// addressed by stable TripleId indices; the execution order is a doubly-linked list
// threaded through the arena by prev/next indices. A triple carries an opcode, two
// operand slots, a destination operand and a backpointer list recording every
// consumer that reads it through a Triple operand. The backpointer list is the
// explicit use count the temporary allocator decrements. Nodes are never removed
// from the arena: passes retire them to Noop in place because other nodes may still
// hold their index as an operand or a jump target. Reference resolution rebuilds
// the backpointer lists from the operands and collapses pass-through wrappers.

//! Triple arena and execution-order list.

use super::opcode::Opcode;
use std::fmt;

/// Stable index of a triple in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TripleId(pub u32);

impl TripleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TripleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Index of an interned literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LitId(pub u32);

/// Temporary storage classes. Slots never migrate between classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TempClass {
    /// Variable address; holds the unit's local variables.
    Var,
    /// Full value.
    Val,
    /// Integer or Boolean.
    Int,
    /// Address of a value.
    ValAddr,
    /// Code address.
    CodeAddr,
}

impl TempClass {
    pub const COUNT: usize = 5;

    pub const ALL: [TempClass; Self::COUNT] = [
        TempClass::Var,
        TempClass::Val,
        TempClass::Int,
        TempClass::ValAddr,
        TempClass::CodeAddr,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Element size in bytes.
    pub const fn size(self) -> u32 {
        match self {
            TempClass::Var => 8,
            TempClass::Val => 32,
            TempClass::Int => 4,
            TempClass::ValAddr => 8,
            TempClass::CodeAddr => 8,
        }
    }

    /// Slots of this class are reused once their last consumer is processed.
    pub const fn recyclable(self) -> bool {
        !matches!(self, TempClass::Var)
    }

    pub fn name(self) -> &'static str {
        match self {
            TempClass::Var => "var",
            TempClass::Val => "val",
            TempClass::Int => "int",
            TempClass::ValAddr => "vad",
            TempClass::CodeAddr => "cad",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == s)
    }
}

impl fmt::Display for TempClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete temporary slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TempSlot {
    pub class: TempClass,
    pub index: u32,
}

impl TempSlot {
    pub const fn new(class: TempClass, index: u32) -> Self {
        Self { class, index }
    }
}

impl fmt::Display for TempSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.class, self.index)
    }
}

/// Operand reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operand {
    #[default]
    Empty,
    /// Value produced by another triple.
    Triple(TripleId),
    /// Allocated temporary.
    Temp(TempSlot),
    /// Integer literal.
    Ilit(i32),
    /// Interned literal value.
    Mlit(LitId),
    /// Jump target: the position of a triple in the execution order.
    Jump(TripleId),
}

impl Operand {
    pub fn is_empty(&self) -> bool {
        matches!(self, Operand::Empty)
    }

    pub fn as_triple(&self) -> Option<TripleId> {
        match *self {
            Operand::Triple(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_temp(&self) -> Option<TempSlot> {
        match *self {
            Operand::Temp(slot) => Some(slot),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Empty => f.write_str("-"),
            Operand::Triple(id) => write!(f, "%{id}"),
            Operand::Temp(slot) => write!(f, "{slot}"),
            Operand::Ilit(v) => write!(f, "#{v}"),
            Operand::Mlit(lit) => write!(f, "lit{}", lit.0),
            Operand::Jump(id) => write!(f, "^{id}"),
        }
    }
}

/// One IR instruction.
#[derive(Debug, Clone)]
pub struct Triple {
    pub opcode: Opcode,
    pub operands: [Operand; 2],
    pub destination: Operand,
    /// Consumers reading this triple, one entry per consuming operand slot.
    pub backptrs: Vec<TripleId>,
    prev: Option<TripleId>,
    next: Option<TripleId>,
    linked: bool,
}

impl Triple {
    fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operands: [Operand::Empty; 2],
            destination: Operand::Empty,
            backptrs: Vec::new(),
            prev: None,
            next: None,
            linked: false,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn has_consumers(&self) -> bool {
        !self.backptrs.is_empty()
    }
}

/// Arena of triples plus the execution-order list.
#[derive(Debug, Clone, Default)]
pub struct TripleGraph {
    triples: Vec<Triple>,
    head: Option<TripleId>,
    tail: Option<TripleId>,
}

impl TripleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a triple without linking it into the execution order.
    pub fn make(&mut self, opcode: Opcode) -> TripleId {
        let id = TripleId(self.triples.len() as u32);
        self.triples.push(Triple::new(opcode));
        id
    }

    /// Allocate a triple and append it to the execution order.
    pub fn push(&mut self, opcode: Opcode) -> TripleId {
        let id = self.make(opcode);
        self.append(id);
        id
    }

    /// Append an unlinked triple at the end of the execution order.
    pub fn append(&mut self, id: TripleId) {
        assert!(!self[id].linked, "{id} is already linked");
        match self.tail {
            Some(tail) => self.insert_after(tail, id),
            None => {
                let t = &mut self[id];
                t.linked = true;
                t.prev = None;
                t.next = None;
                self.head = Some(id);
                self.tail = Some(id);
            }
        }
    }

    /// Link `id` directly after `anchor`.
    pub fn insert_after(&mut self, anchor: TripleId, id: TripleId) {
        assert!(self[anchor].linked, "anchor {anchor} is not linked");
        assert!(!self[id].linked, "{id} is already linked");
        let next = self[anchor].next;
        {
            let t = &mut self[id];
            t.linked = true;
            t.prev = Some(anchor);
            t.next = next;
        }
        self[anchor].next = Some(id);
        match next {
            Some(n) => self[n].prev = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Link `id` directly before `anchor`.
    pub fn insert_before(&mut self, anchor: TripleId, id: TripleId) {
        assert!(self[anchor].linked, "anchor {anchor} is not linked");
        match self[anchor].prev {
            Some(prev) => self.insert_after(prev, id),
            None => {
                assert!(!self[id].linked, "{id} is already linked");
                {
                    let t = &mut self[id];
                    t.linked = true;
                    t.prev = None;
                    t.next = Some(anchor);
                }
                self[anchor].prev = Some(id);
                self.head = Some(id);
            }
        }
    }

    pub fn head(&self) -> Option<TripleId> {
        self.head
    }

    pub fn tail(&self) -> Option<TripleId> {
        self.tail
    }

    pub fn next(&self, id: TripleId) -> Option<TripleId> {
        self[id].next
    }

    pub fn prev(&self, id: TripleId) -> Option<TripleId> {
        self[id].prev
    }

    /// Opcode of the triple following `id`, if any.
    pub fn next_opcode(&self, id: TripleId) -> Option<Opcode> {
        self.next(id).map(|n| self[n].opcode)
    }

    /// Number of triples in the arena, linked or not.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn get(&self, id: TripleId) -> Option<&Triple> {
        self.triples.get(id.index())
    }

    /// Triple ids in execution order.
    pub fn exec_order(&self) -> ExecOrder<'_> {
        ExecOrder { graph: self, cur: self.head }
    }

    /// Retire a triple in place. Operands are cleared without touching
    /// backpointers; use this before reference resolution.
    pub fn retire(&mut self, id: TripleId) {
        let t = &mut self[id];
        t.opcode = Opcode::Noop;
        t.operands = [Operand::Empty; 2];
    }

    pub fn add_backptr(&mut self, producer: TripleId, consumer: TripleId) {
        self[producer].backptrs.push(consumer);
    }

    /// Remove one backpointer entry for `consumer`. Returns whether one was found.
    pub fn remove_backptr(&mut self, producer: TripleId, consumer: TripleId) -> bool {
        let bp = &mut self[producer].backptrs;
        match bp.iter().position(|&c| c == consumer) {
            Some(pos) => {
                bp.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Clear operand `slot` of `id`, dropping the matching backpointer.
    pub fn clear_operand(&mut self, id: TripleId, slot: usize) {
        if let Operand::Triple(producer) = self[id].operands[slot] {
            self.remove_backptr(producer, id);
        }
        self[id].operands[slot] = Operand::Empty;
    }

    /// Follow a pass-through chain to the wrapped triple.
    pub fn skip_passthru(&self, mut id: TripleId) -> TripleId {
        while self[id].opcode == Opcode::PassThru {
            match self[id].operands[0] {
                Operand::Triple(inner) => id = inner,
                other => panic!("pass-through {id} wraps {other} instead of a triple"),
            }
        }
        id
    }

    /// Rebuild every backpointer list from the operands of linked triples.
    ///
    /// Operands that name a pass-through wrapper are redirected to the wrapped
    /// triple; the wrapper keeps its own reference so the allocator can drop it
    /// when the wrapper is retired.
    pub fn resolve_refs(&mut self) {
        for t in &mut self.triples {
            t.backptrs.clear();
        }
        let order: Vec<TripleId> = self.exec_order().collect();
        for id in order {
            let is_passthru = self[id].opcode == Opcode::PassThru;
            for slot in 0..2 {
                if let Operand::Triple(producer) = self[id].operands[slot] {
                    let producer = if is_passthru && slot == 0 {
                        producer
                    } else {
                        let target = self.skip_passthru(producer);
                        self[id].operands[slot] = Operand::Triple(target);
                        target
                    };
                    self.add_backptr(producer, id);
                }
            }
        }
    }

    /// Check that every Triple operand is mirrored by exactly one backpointer.
    pub fn verify_backptrs(&self) -> Result<(), String> {
        let mut expected: Vec<Vec<TripleId>> = vec![Vec::new(); self.triples.len()];
        for id in self.exec_order() {
            for op in &self[id].operands {
                if let Operand::Triple(producer) = *op {
                    expected[producer.index()].push(id);
                }
            }
        }
        for (idx, t) in self.triples.iter().enumerate() {
            let mut want = expected[idx].clone();
            let mut have = t.backptrs.clone();
            want.sort();
            have.sort();
            if want != have {
                return Err(format!(
                    "t{idx} ({}) backpointers {:?} do not mirror consumers {:?}",
                    t.opcode, have, want
                ));
            }
        }
        Ok(())
    }
}

impl std::ops::Index<TripleId> for TripleGraph {
    type Output = Triple;

    fn index(&self, id: TripleId) -> &Triple {
        &self.triples[id.index()]
    }
}

impl std::ops::IndexMut<TripleId> for TripleGraph {
    fn index_mut(&mut self, id: TripleId) -> &mut Triple {
        &mut self.triples[id.index()]
    }
}

/// Iterator over the execution order.
pub struct ExecOrder<'g> {
    graph: &'g TripleGraph,
    cur: Option<TripleId>,
}

impl Iterator for ExecOrder<'_> {
    type Item = TripleId;

    fn next(&mut self) -> Option<TripleId> {
        let id = self.cur?;
        self.cur = self.graph.next(id);
        Some(id)
    }
}
