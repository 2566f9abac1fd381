// This module holds the back end proper: the index-arena IR, the passes that run over it,
// and the session that sequences them. The control-flow graph builder links instructions
// by fallthrough and branch targets, the liveness solver iterates backward to a fixed
// point under a sweep cap, the interference builder turns live-out sets into a symmetric
// matrix, and the allocator colors that matrix with a fixed palette of K physical
// registers by simplify/select without spilling. The emitter renders the colored program
// as MIPS text. Structural problems are CompileError values, while a failed coloring is an
// AllocationStatus the caller inspects.

//! Core back end for MAVN.
//!
//! # Passes
//!
//! 1. [`cfg::build_cfg`] - successor/predecessor edges and use/def sets
//! 2. [`liveness::LivenessSolver`] - live-in/live-out to a fixed point
//! 3. [`interference::InterferenceGraph`] - register conflicts
//! 4. [`allocator::Allocator`] - K-coloring onto a [`register_file::RegisterPalette`]
//! 5. [`emit::Emitter`] - assembly text
//!
//! [`session::Session`] runs them in order with a [`config::PipelineConfig`].

pub mod allocator;
pub mod cfg;
pub mod config;
pub mod emit;
pub mod error;
pub mod interference;
pub mod ir;
pub mod liveness;
pub mod register_file;
pub mod session;

pub use allocator::{is_valid_coloring, AllocationStatus, Allocator, Coloring};
pub use cfg::build_cfg;
pub use config::PipelineConfig;
pub use emit::{EmitOptions, Emitter, EPILOGUE};
pub use error::{AllocError, CompileError, CompileResult};
pub use interference::{InterferenceGraph, InterferenceRule};
pub use ir::{
    BranchKind, InstId, Instruction, OpInfo, Opcode, Program, ProgramBuilder, VarId, VarKind,
    Variable,
};
pub use liveness::{is_fixed_point, LivenessSolver, LivenessSummary, DEFAULT_MAX_SWEEPS};
pub use register_file::{PhysReg, RegisterPalette, DEFAULT_REGISTER_NAMES, MAX_PALETTE_SIZE};
pub use session::{Session, SessionStats};
