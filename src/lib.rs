//! Tribe - triple IR back end.
//!
//! Tribe is the final stage of a compiler for a dynamically-typed scripting
//! language. The front end produces a graph of three-address *triples* in
//! execution order; the back end then
//!
//! 1. lowers Boolean expressions into chains of conditional jumps while the
//!    front end is still parsing ([`passes::bool_lower`]),
//! 2. appends the return triple, resolves references and assigns every value a
//!    class-segregated temporary slot by reference counting
//!    ([`passes::temp_alloc`]),
//! 3. hands the unit to a [`CodeEmitter`] and returns the committed object.
//!
//! # Primary Usage
//!
//! ```ignore
//! use tribe::{CompileKind, CompileOptions, Compiler, ListingEmitter};
//!
//! let mut compiler = Compiler::new(CompileOptions::default(), ListingEmitter::new());
//! let object = compiler.compile(CompileKind::Normal, source, tribe::tir::front_end)?;
//! println!("{}", object.listing().unwrap_or_default());
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Triples, opcodes, temporaries, sessions and the compile driver
//! - [`passes`] - Boolean lowering and temporary allocation
//! - [`tir`] - Textual triple IR: parser, reference evaluator, FileCheck runner

pub mod core;
pub mod passes;
pub mod tir;

pub use core::{
    // Driver
    CgPhase, CompileContext, CompileKind, CompileOptions, Compiler, FullBool, Object, Parsed,
    // Emission
    CodeEmitter, ListingEmitter,
    // Errors
    CompileError, CompileResult,
    // Triples
    LitId, Opcode, Operand, TempClass, TempSlot, Triple, TripleGraph, TripleId,
    // Sessions
    LiteralPool, PoolMode, SessionStats, StringPools,
};
pub use passes::{BoolLowering, TempAllocator, TempLayout};
