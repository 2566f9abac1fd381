//! Control-flow graph construction.
//!
//! Links instructions with successor/predecessor edges derived from
//! fallthrough and branch semantics:
//!
//! - instruction *i* falls through to *i+1* unless *i* is an unconditional
//!   branch or *i+1* is the function entry marker;
//! - a branch also links to the instruction carrying its target label;
//! - a branch to the entry marker is redirected to the first real
//!   instruction after it.

use super::error::{CompileError, CompileResult};
use super::ir::{InstId, Program};
use hashbrown::HashMap;

/// Build the control-flow graph of `program`.
///
/// Also (re)computes use/def sets. Returns the number of edges. Any edges
/// from a previous run are discarded first.
pub fn build_cfg(program: &mut Program) -> CompileResult<usize> {
    check_entry(program)?;
    let targets = resolve_targets(program)?;

    program.clear_edges();
    program.compute_use_def();

    let ids: Vec<InstId> = program.inst_ids().collect();
    for (i, &id) in ids.iter().enumerate() {
        if let Some(&next) = ids.get(i + 1) {
            if !program.instr(id).is_unconditional_branch() && !program.instr(next).is_entry() {
                program.link(id, next);
            }
        }
        if let Some(target) = targets[i] {
            log::trace!(
                "branch {} -> {}",
                program.instr(id).position(),
                program.instr(target).position()
            );
            program.link(id, target);
        }
    }

    let edges = program.edge_count();
    log::debug!("CFG built: {} instructions, {} edges", program.len(), edges);
    Ok(edges)
}

/// Branch target of every instruction, with branches to the entry marker
/// moved to the instruction after it. Fails before any edge is touched.
fn resolve_targets(program: &Program) -> CompileResult<Vec<Option<InstId>>> {
    let labeled: HashMap<_, _> = program
        .instructions()
        .filter_map(|(id, inst)| inst.label().map(|label| (label, id)))
        .collect();

    let mut targets = Vec::with_capacity(program.len());
    for id in program.inst_ids() {
        let Some(label) = program.branch_target(id) else {
            targets.push(None);
            continue;
        };
        let target = *labeled.get(&label).ok_or_else(|| CompileError::LabelNotFound {
            name: program.var(label).name().to_string(),
        })?;
        if !program.instr(target).is_entry() {
            targets.push(Some(target));
            continue;
        }
        let after = program.inst_ids().nth(target.index() + 1);
        if after.is_none() {
            log::warn!(
                "Branch at {} targets the function entry but no instruction follows it",
                program.instr(id).position()
            );
        }
        targets.push(after);
    }
    Ok(targets)
}

fn check_entry(program: &Program) -> CompileResult<()> {
    let count = program.instructions().filter(|(_, i)| i.is_entry()).count();
    match count {
        0 => Err(CompileError::MissingEntry),
        1 => Ok(()),
        count => Err(CompileError::DuplicateEntry { count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ir::{Opcode, ProgramBuilder};

    fn succ_positions(program: &Program, id: InstId) -> Vec<usize> {
        program
            .instr(id)
            .succs()
            .iter()
            .map(|s| program.instr(*s).position())
            .collect()
    }

    #[test]
    fn test_straight_line_fallthrough() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let r1 = b.register("r1");
        let c = b.constant(1);
        let e = b.entry(main).unwrap();
        let i1 = b.instruction(Opcode::Li, &[r1], &[c]).unwrap();
        let i2 = b.instruction(Opcode::Addi, &[r1], &[r1, c]).unwrap();
        let mut program = b.finish();

        let edges = build_cfg(&mut program).unwrap();
        assert_eq!(edges, 2);
        assert_eq!(succ_positions(&program, e), vec![1]);
        assert_eq!(succ_positions(&program, i1), vec![2]);
        assert!(program.instr(i2).succs().is_empty());
        assert_eq!(program.instr(i2).preds().len(), 1);
    }

    #[test]
    fn test_unconditional_branch_has_no_fallthrough() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let end = b.label("end");
        b.entry(main).unwrap();
        let br = b.instruction(Opcode::B, &[], &[end]).unwrap();
        b.instruction(Opcode::Nop, &[], &[]).unwrap();
        let target = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        b.attach_label(target, end).unwrap();
        let mut program = b.finish();

        build_cfg(&mut program).unwrap();
        assert_eq!(succ_positions(&program, br), vec![3]);
        assert!(program.instr(target).preds().contains(&br));
    }

    #[test]
    fn test_conditional_branch_has_two_edges() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let lab = b.label("lab");
        let r1 = b.register("r1");
        b.entry(main).unwrap();
        let first = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        b.attach_label(first, lab).unwrap();
        let br = b.instruction(Opcode::Bltz, &[], &[r1, lab]).unwrap();
        b.instruction(Opcode::Nop, &[], &[]).unwrap();
        let mut program = b.finish();

        build_cfg(&mut program).unwrap();
        assert_eq!(succ_positions(&program, br), vec![1, 3]);
        assert!(program.instr(first).preds().contains(&br));
    }

    #[test]
    fn test_branch_to_entry_is_redirected() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let e = b.entry(main).unwrap();
        let first = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        let br = b.instruction(Opcode::B, &[], &[main]).unwrap();
        let mut program = b.finish();

        build_cfg(&mut program).unwrap();
        assert_eq!(succ_positions(&program, br), vec![first.index()]);
        assert!(!program.instr(br).succs().contains(&e));
        assert!(!program.instr(e).preds().contains(&br));
    }

    #[test]
    fn test_unknown_label_is_fatal() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let nowhere = b.label("nowhere");
        b.entry(main).unwrap();
        b.instruction(Opcode::B, &[], &[nowhere]).unwrap();
        let mut program = b.finish();

        let err = build_cfg(&mut program).unwrap_err();
        assert!(matches!(err, CompileError::LabelNotFound { ref name } if name == "nowhere"));
    }

    #[test]
    fn test_unknown_label_leaves_edges_untouched() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let nowhere = b.label("nowhere");
        let e = b.entry(main).unwrap();
        let first = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        b.instruction(Opcode::B, &[], &[nowhere]).unwrap();
        let mut program = b.finish();
        program.link(e, first);

        assert!(build_cfg(&mut program).is_err());
        assert_eq!(program.edge_count(), 1);
        assert!(program.instr(first).preds().contains(&e));
    }

    #[test]
    fn test_no_fallthrough_into_entry() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let before = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        let e = b.entry(main).unwrap();
        let after = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        let mut program = b.finish();

        assert_eq!(build_cfg(&mut program).unwrap(), 1);
        assert!(program.instr(before).succs().is_empty());
        assert!(program.instr(e).preds().is_empty());
        assert_eq!(program.instr(e).succs().iter().copied().collect::<Vec<_>>(), vec![after]);
    }

    #[test]
    fn test_function_boundary_is_checked() {
        let mut b = ProgramBuilder::new();
        b.instruction(Opcode::Nop, &[], &[]).unwrap();
        let mut program = b.finish();
        assert!(matches!(build_cfg(&mut program), Err(CompileError::MissingEntry)));

        let mut b = ProgramBuilder::new();
        let f = b.label("f");
        let g = b.label("g");
        b.entry(f).unwrap();
        b.instruction(Opcode::Nop, &[], &[]).unwrap();
        b.entry(g).unwrap();
        let mut program = b.finish();
        assert!(matches!(
            build_cfg(&mut program),
            Err(CompileError::DuplicateEntry { count: 2 })
        ));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut b = ProgramBuilder::new();
        let main = b.label("main");
        let lab = b.label("lab");
        let r1 = b.register("r1");
        b.entry(main).unwrap();
        let first = b.instruction(Opcode::Nop, &[], &[]).unwrap();
        b.attach_label(first, lab).unwrap();
        b.instruction(Opcode::Bltz, &[], &[r1, lab]).unwrap();
        let mut program = b.finish();

        let once = build_cfg(&mut program).unwrap();
        let snapshot: Vec<_> = program.instructions().map(|(_, i)| i.succs().clone()).collect();
        let twice = build_cfg(&mut program).unwrap();
        let again: Vec<_> = program.instructions().map(|(_, i)| i.succs().clone()).collect();
        assert_eq!(once, twice);
        assert_eq!(snapshot, again);
    }
}
