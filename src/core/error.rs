// This module defines the error types of the mavn compiler using the thiserror crate.
// CompileError covers the fatal paths: malformed programs detected while building the
// IR or the control-flow graph (unresolved labels, missing or duplicated function entry,
// operands that do not fit an opcode), front-end failures wrapped from the lexer and the
// parser, an optional strict-mode liveness non-convergence error, and I/O failures while
// reading input or writing the output artifact. AllocError is separate: running out of
// registers is an ordinary outcome of allocation and travels inside AllocationStatus
// instead of aborting the pipeline.

//! Error types for the mavn compiler.

use crate::frontend::{LexError, ParseError};
use thiserror::Error;

/// Fatal errors that abort the pipeline.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("No instruction with label {name} exists")]
    LabelNotFound { name: String },

    #[error("Program has no function entry")]
    MissingEntry,

    #[error("Program has {count} function entries, expected exactly one")]
    DuplicateEntry { count: usize },

    #[error("Operands do not match `{opcode}`: {reason}")]
    OperandMismatch {
        opcode: &'static str,
        reason: String,
    },

    #[error("Label {name} is already carried by another instruction")]
    DuplicateLabel { name: String },

    #[error("Variable {name} is not a label and cannot be attached to an instruction")]
    NotALabel { name: String },

    #[error("Liveness analysis did not converge after {sweeps} sweeps")]
    NotConverged { sweeps: usize },

    #[error("Invalid register palette: {reason}")]
    InvalidPalette { reason: String },

    #[error("Program has not been allocated successfully, nothing to emit")]
    NotAllocated,

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// Reasons register allocation can fail. Never spills.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("Out of registers: {remaining} variables each have {palette} or more neighbours")]
    InsufficientRegisters { remaining: usize, palette: usize },

    #[error("No free register left for {name}")]
    ColoringFailed { name: String },
}
