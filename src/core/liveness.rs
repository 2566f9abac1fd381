// This module implements the liveness solver, a backward may-be-live dataflow analysis over
// the instruction-level control-flow graph. Each sweep visits instructions in reverse
// creation order and recomputes out[n] as the union of in[s] over successors and in[n] as
// use[n] plus out[n] minus def[n]. Sweeps repeat until one changes nothing or the sweep cap
// is reached. Reverse creation order is not a reverse post-order of the graph, so loops
// need several sweeps; the summary reports whether a real fixed point was reached so callers
// can decide what to do with a possibly unstable result.

//! Iterative liveness analysis.

use super::ir::{InstId, Program, VarId};
use std::collections::BTreeSet;

/// Sweep cap used when none is configured.
pub const DEFAULT_MAX_SWEEPS: usize = 10;

/// Outcome of a liveness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessSummary {
    /// Number of full sweeps performed.
    pub sweeps: usize,
    /// Whether the last sweep changed nothing.
    pub converged: bool,
}

/// Backward dataflow solver for live-in/live-out sets.
#[derive(Debug, Clone, Copy)]
pub struct LivenessSolver {
    max_sweeps: usize,
}

impl Default for LivenessSolver {
    fn default() -> Self {
        Self {
            max_sweeps: DEFAULT_MAX_SWEEPS,
        }
    }
}

impl LivenessSolver {
    pub fn new(max_sweeps: usize) -> Self {
        Self { max_sweeps }
    }

    pub fn max_sweeps(&self) -> usize {
        self.max_sweeps
    }

    /// Compute live-in/live-out for every instruction.
    ///
    /// Expects the control-flow graph and use/def sets to be built.
    pub fn solve(&self, program: &mut Program) -> LivenessSummary {
        let mut sweeps = 0;
        let mut converged = false;

        while sweeps < self.max_sweeps {
            sweeps += 1;
            let changed = sweep(program);
            log::trace!("liveness sweep {sweeps}: changed = {changed}");
            if !changed {
                converged = true;
                break;
            }
        }

        if converged {
            log::debug!("Liveness converged after {sweeps} sweeps");
        } else {
            log::warn!(
                "Liveness stopped after {sweeps} sweeps without reaching a fixed point"
            );
        }
        LivenessSummary { sweeps, converged }
    }
}

/// One pass over all instructions in reverse creation order.
fn sweep(program: &mut Program) -> bool {
    let mut changed = false;
    let ids: Vec<InstId> = program.inst_ids().rev().collect();
    for id in ids {
        let (live_in, live_out) = transfer(program, id);
        let inst = program.instr(id);
        if inst.live_in() != &live_in || inst.live_out() != &live_out {
            changed = true;
            program.instr_mut(id).set_live(live_in, live_out);
        }
    }
    changed
}

/// Dataflow equations for one instruction, from the current state.
fn transfer(program: &Program, id: InstId) -> (BTreeSet<VarId>, BTreeSet<VarId>) {
    let inst = program.instr(id);
    let live_out: BTreeSet<VarId> = inst
        .succs()
        .iter()
        .flat_map(|s| program.instr(*s).live_in().iter().copied())
        .collect();
    let mut live_in: BTreeSet<VarId> = live_out.difference(inst.defs()).copied().collect();
    live_in.extend(inst.uses().iter().copied());
    (live_in, live_out)
}

/// Whether the dataflow equations hold for every instruction.
pub fn is_fixed_point(program: &Program) -> bool {
    program.instructions().all(|(id, inst)| {
        let (live_in, live_out) = transfer(program, id);
        inst.live_in() == &live_in && inst.live_out() == &live_out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cfg::build_cfg;
    use crate::core::ir::{Opcode, ProgramBuilder};

    fn names(program: &Program, set: &BTreeSet<VarId>) -> Vec<String> {
        set.iter().map(|v| program.var(*v).name().to_string()).collect()
    }

    #[test]
    fn test_straight_line_liveness() {
        // main:
        //   li r1, 1
        //   li r2, 2
        //   add r3, r1, r2
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let r1 = b.register("r1");
        let r2 = b.register("r2");
        let r3 = b.register("r3");
        let c1 = b.constant(1);
        let c2 = b.constant(2);
        b.entry(main).unwrap();
        let li1 = b.instruction(Opcode::Li, &[r1], &[c1]).unwrap();
        let li2 = b.instruction(Opcode::Li, &[r2], &[c2]).unwrap();
        let add = b.instruction(Opcode::Add, &[r3], &[r1, r2]).unwrap();
        let mut program = b.finish();
        build_cfg(&mut program).unwrap();

        let summary = LivenessSolver::default().solve(&mut program);
        assert!(summary.converged);
        assert!(is_fixed_point(&program));

        assert!(program.instr(li1).live_in().is_empty());
        assert_eq!(names(&program, program.instr(li1).live_out()), vec!["r1"]);
        assert_eq!(names(&program, program.instr(li2).live_out()), vec!["r1", "r2"]);
        assert_eq!(names(&program, program.instr(add).live_in()), vec!["r1", "r2"]);
        assert!(program.instr(add).live_out().is_empty());
    }

    #[test]
    fn test_loop_carries_liveness_backwards() {
        // main:
        //   li r1, 5
        // lab:
        //   addi r1, r1, -1
        //   bltz r1, lab
        //   li r2, 0
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let lab = b.label("lab");
        let r1 = b.register("r1");
        let r2 = b.register("r2");
        let c5 = b.constant(5);
        let cm1 = b.constant(-1);
        let c0 = b.constant(0);
        b.entry(main).unwrap();
        let li = b.instruction(Opcode::Li, &[r1], &[c5]).unwrap();
        let dec = b.instruction(Opcode::Addi, &[r1], &[r1, cm1]).unwrap();
        b.attach_label(dec, lab).unwrap();
        let br = b.instruction(Opcode::Bltz, &[], &[r1, lab]).unwrap();
        let last = b.instruction(Opcode::Li, &[r2], &[c0]).unwrap();
        let mut program = b.finish();
        build_cfg(&mut program).unwrap();

        let summary = LivenessSolver::default().solve(&mut program);
        assert!(summary.converged);
        assert!(summary.sweeps >= 2);
        assert!(is_fixed_point(&program));

        // r1 is live around the back edge.
        assert!(program.instr(br).live_out().contains(&r1));
        assert!(program.instr(li).live_out().contains(&r1));
        assert!(!program.instr(last).live_in().contains(&r1));
        // r2 is dead after its definition.
        assert!(!program.instr(last).live_out().contains(&r2));
    }

    #[test]
    fn test_sweep_cap_reports_nonconvergence() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let r1 = b.register("r1");
        let r2 = b.register("r2");
        let c = b.constant(1);
        b.entry(main).unwrap();
        b.instruction(Opcode::Li, &[r1], &[c]).unwrap();
        b.instruction(Opcode::Add, &[r2], &[r1, r1]).unwrap();
        let mut program = b.finish();
        build_cfg(&mut program).unwrap();

        // The first sweep always changes something when a variable is used.
        let summary = LivenessSolver::new(1).solve(&mut program);
        assert_eq!(summary, LivenessSummary { sweeps: 1, converged: false });

        let summary = LivenessSolver::new(0).solve(&mut program);
        assert_eq!(summary.sweeps, 0);
        assert!(!summary.converged);
    }

    #[test]
    fn test_solving_twice_is_stable() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let r1 = b.register("r1");
        let c = b.constant(3);
        b.entry(main).unwrap();
        b.instruction(Opcode::Li, &[r1], &[c]).unwrap();
        b.instruction(Opcode::Not, &[r1], &[r1]).unwrap();
        let mut program = b.finish();
        build_cfg(&mut program).unwrap();

        LivenessSolver::default().solve(&mut program);
        let summary = LivenessSolver::default().solve(&mut program);
        assert_eq!(summary, LivenessSummary { sweeps: 1, converged: true });
    }
}
