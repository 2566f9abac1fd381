//! Pipeline configuration.

use super::emit::EmitOptions;
use super::interference::InterferenceRule;
use super::liveness::DEFAULT_MAX_SWEEPS;
use super::register_file::RegisterPalette;

/// Knobs for one compilation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Physical registers available to the allocator.
    pub palette: RegisterPalette,
    /// Liveness sweep cap.
    pub max_sweeps: usize,
    /// Treat a liveness run that hits the sweep cap as a fatal error.
    pub require_convergence: bool,
    pub interference_rule: InterferenceRule,
    pub emit: EmitOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            palette: RegisterPalette::default(),
            max_sweeps: DEFAULT_MAX_SWEEPS,
            require_convergence: false,
            interference_rule: InterferenceRule::default(),
            emit: EmitOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_palette(mut self, palette: RegisterPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn strict(mut self, require_convergence: bool) -> Self {
        self.require_convergence = require_convergence;
        self
    }

    pub fn with_rule(mut self, rule: InterferenceRule) -> Self {
        self.interference_rule = rule;
        self
    }

    pub fn with_emit(mut self, emit: EmitOptions) -> Self {
        self.emit = emit;
        self
    }
}
