//! Textual triple IR (TIR) for tests and the `tripc` driver.
//!
//! TIR plays the role of a front end: it builds a triple graph in a
//! [`CompileContext`], requests Boolean lowering where the text asks for it,
//! and reports how much of the source it consumed. [`eval`] interprets the
//! resulting graph and [`check`] runs FileCheck-style `.tir` files.

pub mod check;
pub mod eval;
pub mod parser;

pub use check::{CheckDirective, RunDirective, TestRunner, TestSpec};
pub use eval::{pattern_match, Evaluator, Outcome, Value};
pub use parser::{parse_into, TirUnit};

use crate::core::compiler::{CompileContext, Parsed};
use crate::core::error::{CompileError, CompileResult};

/// Front end for [`Compiler::compile`](crate::core::Compiler::compile) that
/// reads TIR.
pub fn front_end(ctx: &mut CompileContext<'_>, source: &str) -> CompileResult<Parsed> {
    parse_into(ctx, source)
        .map(|unit| unit.parsed)
        .map_err(|reason| CompileError::FrontEnd { reason })
}
