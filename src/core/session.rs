// This module provides the analysis session that owns a Program for the whole compilation
// and drives the passes in order: control-flow graph, liveness, interference graph, register
// allocation and emission. Structural problems surface as CompileError and stop the run
// before any analysis result is used, while an allocation that runs out of registers is
// stored as an AllocationStatus so callers can report it without unwinding. SessionStats
// collects per-pass counters (edges, sweeps, convergence, interference edges, registers
// used) for logging and for the driver's summary line.

//! Compilation session.

use super::allocator::{AllocationStatus, Allocator};
use super::cfg::build_cfg;
use super::config::PipelineConfig;
use super::emit::Emitter;
use super::error::{CompileError, CompileResult};
use super::interference::InterferenceGraph;
use super::ir::Program;
use super::liveness::{LivenessSolver, LivenessSummary};
use crate::frontend;
use std::fmt;
use std::path::Path;

/// Counters gathered while running the pipeline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub instructions: usize,
    pub register_vars: usize,
    pub memory_vars: usize,
    pub cfg_edges: usize,
    pub liveness_sweeps: usize,
    pub liveness_converged: bool,
    pub interference_edges: usize,
    /// Distinct physical registers used by a successful allocation.
    pub registers_used: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Statistics:")?;
        writeln!(f, "  Instructions: {}", self.instructions)?;
        writeln!(f, "  Register variables: {}", self.register_vars)?;
        writeln!(f, "  Memory variables: {}", self.memory_vars)?;
        writeln!(f, "  CFG edges: {}", self.cfg_edges)?;
        writeln!(
            f,
            "  Liveness sweeps: {}{}",
            self.liveness_sweeps,
            if self.liveness_converged { "" } else { " (not converged)" }
        )?;
        writeln!(f, "  Interference edges: {}", self.interference_edges)?;
        writeln!(f, "  Registers used: {}", self.registers_used)?;
        Ok(())
    }
}

/// Owns one program and runs the back end over it.
pub struct Session {
    program: Program,
    config: PipelineConfig,
    graph: Option<InterferenceGraph>,
    liveness: Option<LivenessSummary>,
    status: Option<AllocationStatus>,
    stats: SessionStats,
}

impl Session {
    pub fn new(program: Program, config: PipelineConfig) -> Self {
        let stats = SessionStats {
            instructions: program.len(),
            register_vars: program.register_count(),
            memory_vars: program.memory_vars().len(),
            ..SessionStats::default()
        };
        Self {
            program,
            config,
            graph: None,
            liveness: None,
            status: None,
            stats,
        }
    }

    /// Lex and parse MAVN source into a new session.
    pub fn from_source(source: &str, config: PipelineConfig) -> CompileResult<Self> {
        let program = frontend::parse_program(source)?;
        Ok(Self::new(program, config))
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn graph(&self) -> Option<&InterferenceGraph> {
        self.graph.as_ref()
    }

    pub fn liveness(&self) -> Option<LivenessSummary> {
        self.liveness
    }

    pub fn status(&self) -> Option<&AllocationStatus> {
        self.status.as_ref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Build the CFG, solve liveness and build the interference graph.
    pub fn analyze(&mut self) -> CompileResult<LivenessSummary> {
        log::info!(
            "Analyzing {} instructions, {} register variables",
            self.program.len(),
            self.program.register_count()
        );
        self.stats.cfg_edges = build_cfg(&mut self.program)?;

        let summary = LivenessSolver::new(self.config.max_sweeps).solve(&mut self.program);
        self.stats.liveness_sweeps = summary.sweeps;
        self.stats.liveness_converged = summary.converged;
        self.liveness = Some(summary);
        if !summary.converged && self.config.require_convergence {
            return Err(CompileError::NotConverged {
                sweeps: summary.sweeps,
            });
        }

        let graph = InterferenceGraph::build(&self.program, self.config.interference_rule);
        self.stats.interference_edges = graph.edge_count();
        log::debug!("Interference matrix:\n{graph}");
        self.graph = Some(graph);
        Ok(summary)
    }

    /// Run analysis and allocation. Structural problems are `Err`; running
    /// out of registers is reported through the returned status.
    pub fn allocate(&mut self) -> CompileResult<&AllocationStatus> {
        self.analyze()?;
        let graph = self.graph.as_ref().ok_or(CompileError::NotAllocated)?;

        let status = Allocator::new(&self.config.palette).allocate(&mut self.program, graph);
        self.stats.registers_used = status.coloring().map_or(0, |c| c.registers_used());
        Ok(self.status.insert(status))
    }

    /// Top-level entry: `Ok(true)` when every register variable got a
    /// physical register.
    pub fn do_allocation(&mut self) -> CompileResult<bool> {
        Ok(self.allocate()?.is_success())
    }

    /// Emitter over the current program state.
    pub fn emitter(&self) -> Emitter<'_> {
        Emitter::new(&self.program, &self.config.palette).with_options(self.config.emit)
    }

    /// Output text. Only available after a successful allocation.
    pub fn output(&self) -> CompileResult<String> {
        self.require_allocated()?;
        Ok(self.emitter().to_text())
    }

    /// Write the output artifact. Only available after a successful allocation.
    pub fn write_output(&self, path: impl AsRef<Path>) -> CompileResult<()> {
        self.require_allocated()?;
        self.emitter().write_file(path)
    }

    fn require_allocated(&self) -> CompileResult<()> {
        match &self.status {
            Some(status) if status.is_success() => Ok(()),
            _ => Err(CompileError::NotAllocated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::allocator::is_valid_coloring;
    use crate::core::error::AllocError;

    const SIMPLE: &str = "
        _mem m1 6;
        _mem m2 5;
        _reg r1;
        _reg r2;
        _reg r3;
        _reg r4;
        _reg r5;
        _func main;
            la r4, m1;
            lw r1, 0(r4);
            la r5, m2;
            lw r2, 0(r5);
            add r3, r1, r2;
    ";

    #[test]
    fn test_session_runs_all_passes() {
        let mut session = Session::from_source(SIMPLE, PipelineConfig::default()).unwrap();
        assert!(session.do_allocation().unwrap());

        let stats = session.stats();
        assert_eq!(stats.instructions, 6);
        assert_eq!(stats.register_vars, 5);
        assert_eq!(stats.memory_vars, 2);
        assert!(stats.liveness_converged);
        assert!(stats.registers_used >= 2);

        let graph = session.graph().unwrap();
        assert!(is_valid_coloring(session.program(), graph, &session.config().palette));
        assert!(session.output().unwrap().starts_with(".data\nm1:\t.word 6\n"));
    }

    #[test]
    fn test_output_requires_successful_allocation() {
        let session = Session::from_source(SIMPLE, PipelineConfig::default()).unwrap();
        assert!(matches!(session.output(), Err(CompileError::NotAllocated)));
    }

    #[test]
    fn test_allocation_failure_is_a_status() {
        // Four values live at once with a two-register palette.
        let source = "
            _reg r1; _reg r2; _reg r3; _reg r4;
            _func main;
                li r1, 1;
                li r2, 2;
                li r3, 3;
                li r4, 4;
                add r1, r1, r2;
                add r3, r3, r4;
                add r1, r1, r3;
                sw r1, 0(r1);
        ";
        let config = PipelineConfig::default()
            .with_palette(crate::core::register_file::RegisterPalette::with_size(2).unwrap());
        let mut session = Session::from_source(source, config).unwrap();
        let status = session.allocate().unwrap().clone();
        assert!(matches!(
            status,
            AllocationStatus::Failed(AllocError::InsufficientRegisters { .. })
        ));
        assert!(!session.do_allocation().unwrap());
        assert_eq!(session.stats().registers_used, 0);
        assert!(session.output().is_err());
    }

    #[test]
    fn test_strict_liveness_fails_on_cap() {
        let config = PipelineConfig::default().with_max_sweeps(1).strict(true);
        let mut session = Session::from_source(SIMPLE, config).unwrap();
        assert!(matches!(
            session.do_allocation(),
            Err(CompileError::NotConverged { sweeps: 1 })
        ));
    }

    #[test]
    fn test_lenient_liveness_continues_on_cap() {
        let config = PipelineConfig::default().with_max_sweeps(1);
        let mut session = Session::from_source(SIMPLE, config).unwrap();
        session.do_allocation().unwrap();
        assert_eq!(session.liveness().map(|l| l.converged), Some(false));
        assert!(!session.stats().liveness_converged);
    }
}
