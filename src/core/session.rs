// This module provides the arena-based string pools and per-unit session state of
// the back end, built on the bumpalo crate. StringPools owns two interning arenas:
// the runtime pool used by normal compiles and the indirect pool used while
// compiling dynamically-constructed code. A compile enters one of the two modes,
// borrows the active arena for the lifetime of its unit, and the finalizer
// restores the runtime mode and releases the indirect arena whether the compile
// succeeded or failed, so no half-built literal state survives into the next
// compile. LiteralPool interns literal text inside the active arena and hands out
// stable LitId indices for Mlit operands. SessionStats collects per-unit counters
// (triples visited, temporaries per class, retirements, forwarded stores,
// literal stores, synthesised jumps) and prints them for the tripc driver.

//! Arena-based string pools and session statistics.
//!
//! All literal text of a compile unit lives in one of the two pools and shares
//! the lifetime of the borrow the unit holds on it.

use super::triple::{LitId, TempClass};
use bumpalo::Bump;
use hashbrown::HashMap;
use std::fmt;

/// Which interning arena is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    /// Top-level compiles (routines).
    Normal,
    /// Dynamically-constructed code compiled at run time.
    Indirect,
}

/// The two interning arenas and the mode switch between them.
pub struct StringPools {
    runtime: Bump,
    indirect: Bump,
    mode: PoolMode,
}

impl StringPools {
    pub fn new() -> Self {
        Self {
            runtime: Bump::new(),
            indirect: Bump::new(),
            mode: PoolMode::Normal,
        }
    }

    pub fn mode(&self) -> PoolMode {
        self.mode
    }

    /// Switch to `mode` at the start of a compile.
    pub fn enter(&mut self, mode: PoolMode) {
        assert_eq!(
            self.mode,
            PoolMode::Normal,
            "string pools entered twice without being restored"
        );
        self.mode = mode;
        log::trace!("string pools entered {:?} mode", mode);
    }

    /// Arena literals of the current compile are interned into.
    pub fn active(&self) -> &Bump {
        match self.mode {
            PoolMode::Normal => &self.runtime,
            PoolMode::Indirect => &self.indirect,
        }
    }

    /// Return to the runtime pool and release everything the indirect pool holds.
    pub fn restore(&mut self) {
        self.indirect.reset();
        self.mode = PoolMode::Normal;
        log::trace!("string pools restored to Normal mode");
    }

    pub fn allocated_bytes(&self, mode: PoolMode) -> usize {
        match mode {
            PoolMode::Normal => self.runtime.allocated_bytes(),
            PoolMode::Indirect => self.indirect.allocated_bytes(),
        }
    }
}

impl Default for StringPools {
    fn default() -> Self {
        Self::new()
    }
}

/// Literal text interned in an arena.
pub struct LiteralPool<'arena> {
    arena: &'arena Bump,
    index: HashMap<&'arena str, LitId>,
    strings: Vec<&'arena str>,
}

impl<'arena> LiteralPool<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            index: HashMap::new(),
            strings: Vec::new(),
        }
    }

    /// Intern `s`, returning the id of the existing copy if there is one.
    pub fn intern(&mut self, s: &str) -> LitId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let text: &'arena str = self.arena.alloc_str(s);
        let id = LitId(self.strings.len() as u32);
        self.strings.push(text);
        self.index.insert(text, id);
        id
    }

    pub fn get(&self, id: LitId) -> &'arena str {
        self.strings[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Per-unit statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Triples visited by the allocator.
    pub triples_visited: usize,

    /// Temporaries handed out per class.
    pub temps_allocated: [usize; TempClass::COUNT],

    /// Temporaries returned for reuse.
    pub temps_freed: usize,

    /// Triples retired to no-op by the allocator.
    pub retired: usize,

    /// Producers whose single store consumer was folded away.
    pub stores_forwarded: usize,

    /// Stores specialised to literal stores.
    pub literal_stores: usize,

    /// Jump triples synthesised by Boolean lowering.
    pub jumps_synthesized: usize,

    /// Live full-value temporaries dropped at line boundaries.
    pub line_clears: usize,
}

impl SessionStats {
    pub fn record_temp(&mut self, class: TempClass) {
        self.temps_allocated[class.index()] += 1;
    }

    pub fn total_temps(&self) -> usize {
        self.temps_allocated.iter().sum()
    }
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compile Unit Statistics:")?;
        writeln!(f, "  Triples visited: {}", self.triples_visited)?;
        writeln!(f, "  Temporaries allocated: {}", self.total_temps())?;
        for class in TempClass::ALL {
            let n = self.temps_allocated[class.index()];
            if n > 0 {
                writeln!(f, "    {}: {}", class, n)?;
            }
        }
        writeln!(f, "  Temporaries freed: {}", self.temps_freed)?;
        writeln!(f, "  Retired to noop: {}", self.retired)?;
        writeln!(f, "  Stores forwarded: {}", self.stores_forwarded)?;
        writeln!(f, "  Literal stores: {}", self.literal_stores)?;
        writeln!(f, "  Jumps synthesized: {}", self.jumps_synthesized)?;
        writeln!(f, "  Line boundary clears: {}", self.line_clears)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_interning() {
        let arena = Bump::new();
        let mut pool = LiteralPool::new(&arena);

        let a = pool.intern("hello");
        let b = pool.intern("hello");
        let c = pool.intern("world");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.get(c), "world");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_pools_switch_and_restore() {
        let mut pools = StringPools::new();
        assert_eq!(pools.mode(), PoolMode::Normal);

        pools.enter(PoolMode::Indirect);
        {
            let mut lits = LiteralPool::new(pools.active());
            lits.intern("dynamically built code");
        }
        assert!(pools.allocated_bytes(PoolMode::Indirect) > 0);

        pools.restore();
        assert_eq!(pools.mode(), PoolMode::Normal);
    }

    #[test]
    #[should_panic(expected = "entered twice")]
    fn test_pools_reject_double_entry() {
        let mut pools = StringPools::new();
        pools.enter(PoolMode::Indirect);
        pools.enter(PoolMode::Normal);
    }

    #[test]
    fn test_statistics_display() {
        let mut stats = SessionStats::default();
        stats.triples_visited = 12;
        stats.record_temp(TempClass::Val);
        stats.record_temp(TempClass::Val);
        stats.record_temp(TempClass::Int);
        stats.stores_forwarded = 1;

        let output = stats.to_string();
        assert!(output.contains("Triples visited: 12"));
        assert!(output.contains("Temporaries allocated: 3"));
        assert!(output.contains("val: 2"));
        assert!(output.contains("Stores forwarded: 1"));
    }
}
