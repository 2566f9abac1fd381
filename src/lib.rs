//! mavn - register allocation for MAVN assembly.
//!
//! Compiles MAVN, a small MIPS-like assembly over symbolic registers, into
//! MIPS assembly that uses a fixed set of physical registers. The back end
//! builds a control-flow graph, solves liveness, builds an interference
//! graph and colors it with K registers (no spilling).
//!
//! # Usage
//!
//! ```no_run
//! use mavn::{PipelineConfig, Session};
//!
//! let source = std::fs::read_to_string("simple.mavn")?;
//! let mut session = Session::from_source(&source, PipelineConfig::default())?;
//! if session.do_allocation()? {
//!     session.write_output("simple.s")?;
//! }
//! # Ok::<(), mavn::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`frontend`] - lexer and parser producing a [`Program`]
//! - [`core`] - IR, analysis passes, allocator, emitter and session

pub mod core;
pub mod frontend;

pub use self::core::{
    // IR
    InstId, Instruction, Opcode, Program, ProgramBuilder, VarId, VarKind, Variable,
    // Passes
    build_cfg, InterferenceGraph, InterferenceRule, LivenessSolver, LivenessSummary,
    // Allocation
    AllocError, AllocationStatus, Allocator, Coloring, PhysReg, RegisterPalette,
    // Emission
    EmitOptions, Emitter,
    // Session management
    CompileError, CompileResult, PipelineConfig, Session, SessionStats,
};
pub use self::frontend::{parse_program, LexError, ParseError};
