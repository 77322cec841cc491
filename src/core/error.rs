// This module defines the error types of the triple back end using the thiserror
// crate. CompileError covers the user/resource-facing failures a compile unit can
// report to its caller: temporary-class exhaustion (the unit needs more live
// temporaries of one class than the ceiling allows), extra characters left after
// the front end finished, a front-end failure reported through the finalizer, and
// emitter failures. Internal invariant violations (an unexpected opcode reaching
// Boolean lowering, an unclassifiable destination, a dangling pre-resolved
// destination) are not represented here: they are bugs in IR construction and
// abort with a panic. CompileResult<T> is the convenience alias.

//! Error types for the triple back end.

use super::temp_file::TempFileError;
use super::triple::TempClass;
use thiserror::Error;

/// Main error type for a compile unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("temporary storage exhausted: more than {limit} live {class} temporaries")]
    TempStoreMax { class: TempClass, limit: usize },

    #[error("extra characters after expression at column {column}")]
    ExtraChars { column: usize },

    #[error("front end failed: {reason}")]
    FrontEnd { reason: String },

    #[error("code emission failed: {reason}")]
    Emit { reason: String },
}

impl From<TempFileError> for CompileError {
    fn from(err: TempFileError) -> Self {
        match err {
            TempFileError::Exhausted { class, limit } => CompileError::TempStoreMax { class, limit },
            // A slot beyond the ceiling was never handed out.
            TempFileError::OutOfRange(slot) => panic!("temporary bookkeeping corrupted: {slot} out of range"),
        }
    }
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
