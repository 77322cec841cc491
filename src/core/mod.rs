// This module serves as the hub of the back end's core infrastructure: the triple
// graph and its opcode table, the per-class temporary slot table, string pools
// and session statistics, the error types, the emitter boundary and the
// compilation driver that sequences the passes. The passes themselves live in
// crate::passes and operate on the CompileContext defined here.

//! Core back-end infrastructure.
//!
//! # Key Components
//!
//! ## Triple graph (`triple`, `opcode`)
//! - Arena of triples addressed by stable `TripleId`s
//! - Doubly-linked execution order, `Noop` as soft delete
//! - Backpointer lists as explicit use counts
//!
//! ## Temporary slots (`temp_file`)
//! - Per-class occupancy tables with lowest-free-slot allocation
//! - High-water marks that size the temporary region
//!
//! ## Session (`session`)
//! - Normal and indirect interning arenas using `bumpalo`
//! - Per-unit statistics
//!
//! ## Driver (`compiler`, `emitter`)
//! - Compile options and per-unit context
//! - Finalizer: resolve, allocate, emit, restore pools

pub mod compiler;
pub mod emitter;
pub mod error;
pub mod opcode;
pub mod session;
pub mod temp_file;
pub mod triple;

pub use compiler::{
    CgPhase,
    CompileContext,
    CompileKind,
    CompileOptions,
    Compiler,
    FullBool,
    Object,
    Parsed,
};

pub use emitter::{CodeEmitter, ListingEmitter};

pub use error::{CompileError, CompileResult};

pub use opcode::{OpInfo, Opcode, ValueKind};

pub use session::{LiteralPool, PoolMode, SessionStats, StringPools};

pub use temp_file::{TempFile, TempFileError, MAX_TEMP_COUNT};

pub use triple::{LitId, Operand, TempClass, TempSlot, Triple, TripleGraph, TripleId};
