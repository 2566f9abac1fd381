// This module holds the intermediate representation consumed by every pass: Variables and
// Instructions stored in index arenas owned by a Program. Instructions never own their
// operands, they refer to them through VarId handles, and control edges are InstId sets so
// loops in the control-flow graph do not create ownership cycles. Opcode carries a static
// OpInfo table describing operand shape, branch behaviour and the emission template of each
// MAVN instruction. ProgramBuilder is the construction session: it owns the sequence
// generators for instruction and register positions and validates operand shapes, so every
// Program it yields satisfies the input contract of the analysis passes.

//! IR model: variables, instructions and the program arena.

use super::error::{CompileError, CompileResult};
use super::register_file::PhysReg;
use hashbrown::HashMap;
use std::collections::BTreeSet;
use std::fmt;

/// Handle to a variable in a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to an instruction in a [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstId(usize);

impl InstId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Register,
    Memory,
    Label,
    Constant,
    Untyped,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VarKind::Register => "register",
            VarKind::Memory => "memory",
            VarKind::Label => "label",
            VarKind::Constant => "constant",
            VarKind::Untyped => "untyped",
        };
        f.write_str(name)
    }
}

/// One operand of the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    kind: VarKind,
    name: String,
    /// Initial value for memory, literal for constants, 1/0 "defined" flag for labels.
    value: i32,
    /// Dense index into the interference matrix. Registers only.
    position: Option<usize>,
    assignment: Option<PhysReg>,
}

impl Variable {
    pub fn kind(&self) -> VarKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Physical register chosen by the allocator, if any.
    pub fn assignment(&self) -> Option<PhysReg> {
        self.assignment
    }

    pub fn is_register(&self) -> bool {
        self.kind == VarKind::Register
    }

    /// For labels: whether a definition site has been seen.
    pub fn is_defined_label(&self) -> bool {
        self.kind == VarKind::Label && self.value == 1
    }
}

/// How an opcode affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    None,
    Unconditional,
    Conditional,
}

/// Supported MAVN opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Addi,
    Sub,
    And,
    Or,
    Not,
    La,
    Li,
    Lw,
    Sw,
    B,
    Bltz,
    Bne,
    Nop,
}

/// Static description of an opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub name: &'static str,
    pub dst: &'static [VarKind],
    pub src: &'static [VarKind],
    pub branch: BranchKind,
    /// Output template. `'x` marks an operand slot, filled left to right
    /// by destinations and then sources.
    pub template: &'static str,
}

impl OpInfo {
    const fn new(
        name: &'static str,
        dst: &'static [VarKind],
        src: &'static [VarKind],
        branch: BranchKind,
        template: &'static str,
    ) -> Self {
        Self {
            name,
            dst,
            src,
            branch,
            template,
        }
    }
}

impl Opcode {
    pub const fn info(self) -> OpInfo {
        use BranchKind as Br;
        use Opcode::*;
        use VarKind::{Constant as C, Label as L, Memory as M, Register as R};
        match self {
            Add => OpInfo::new("add", &[R], &[R, R], Br::None, "add 'd, 's, 's"),
            Addi => OpInfo::new("addi", &[R], &[R, C], Br::None, "addi 'd, 's, 'c"),
            Sub => OpInfo::new("sub", &[R], &[R, R], Br::None, "sub 'd, 's, 's"),
            And => OpInfo::new("and", &[R], &[R, R], Br::None, "and 'd, 's, 's"),
            Or => OpInfo::new("or", &[R], &[R, R], Br::None, "or 'd, 's, 's"),
            Not => OpInfo::new("not", &[R], &[R], Br::None, "not 'd, 's"),
            La => OpInfo::new("la", &[R], &[M], Br::None, "la 'd, 'm"),
            Li => OpInfo::new("li", &[R], &[C], Br::None, "li 'd, 'c"),
            Lw => OpInfo::new("lw", &[R], &[C, R], Br::None, "lw 'd, 'c('s)"),
            Sw => OpInfo::new("sw", &[], &[R, C, R], Br::None, "sw 's, 'c('s)"),
            B => OpInfo::new("b", &[], &[L], Br::Unconditional, "b 'l"),
            Bltz => OpInfo::new("bltz", &[], &[R, L], Br::Conditional, "bltz 's, 'l"),
            Bne => OpInfo::new("bne", &[], &[R, R, L], Br::Conditional, "bne 's, 's, 'l"),
            Nop => OpInfo::new("nop", &[], &[], Br::None, "nop"),
        }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let op = match s {
            "add" => Opcode::Add,
            "addi" => Opcode::Addi,
            "sub" => Opcode::Sub,
            "and" => Opcode::And,
            "or" => Opcode::Or,
            "not" => Opcode::Not,
            "la" => Opcode::La,
            "li" => Opcode::Li,
            "lw" => Opcode::Lw,
            "sw" => Opcode::Sw,
            "b" => Opcode::B,
            "bltz" => Opcode::Bltz,
            "bne" => Opcode::Bne,
            "nop" => Opcode::Nop,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One operation of the program.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    position: usize,
    /// `None` only for the function entry marker.
    opcode: Option<Opcode>,
    label: Option<VarId>,
    dst: Vec<VarId>,
    src: Vec<VarId>,

    // Derived fields, each written by a single pass.
    uses: BTreeSet<VarId>,
    defs: BTreeSet<VarId>,
    live_in: BTreeSet<VarId>,
    live_out: BTreeSet<VarId>,
    succs: BTreeSet<InstId>,
    preds: BTreeSet<InstId>,
}

impl Instruction {
    fn new(position: usize, opcode: Option<Opcode>, label: Option<VarId>) -> Self {
        Self {
            position,
            opcode,
            label,
            dst: Vec::new(),
            src: Vec::new(),
            uses: BTreeSet::new(),
            defs: BTreeSet::new(),
            live_in: BTreeSet::new(),
            live_out: BTreeSet::new(),
            succs: BTreeSet::new(),
            preds: BTreeSet::new(),
        }
    }

    /// Creation-order position, unique in the program.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn opcode(&self) -> Option<Opcode> {
        self.opcode
    }

    pub fn label(&self) -> Option<VarId> {
        self.label
    }

    pub fn dst(&self) -> &[VarId] {
        &self.dst
    }

    pub fn src(&self) -> &[VarId] {
        &self.src
    }

    pub fn uses(&self) -> &BTreeSet<VarId> {
        &self.uses
    }

    pub fn defs(&self) -> &BTreeSet<VarId> {
        &self.defs
    }

    pub fn live_in(&self) -> &BTreeSet<VarId> {
        &self.live_in
    }

    pub fn live_out(&self) -> &BTreeSet<VarId> {
        &self.live_out
    }

    pub fn succs(&self) -> &BTreeSet<InstId> {
        &self.succs
    }

    pub fn preds(&self) -> &BTreeSet<InstId> {
        &self.preds
    }

    /// The function entry marker: a label and no opcode.
    pub fn is_entry(&self) -> bool {
        self.opcode.is_none() && self.label.is_some()
    }

    pub fn branch_kind(&self) -> BranchKind {
        self.opcode.map_or(BranchKind::None, |op| op.info().branch)
    }

    pub fn is_unconditional_branch(&self) -> bool {
        self.branch_kind() == BranchKind::Unconditional
    }

    pub fn is_conditional_branch(&self) -> bool {
        self.branch_kind() == BranchKind::Conditional
    }

    pub(crate) fn set_live(&mut self, live_in: BTreeSet<VarId>, live_out: BTreeSet<VarId>) {
        self.live_in = live_in;
        self.live_out = live_out;
    }
}

/// A whole MAVN program: one function plus its variables.
///
/// Variables and instructions live in arenas indexed by [`VarId`] and
/// [`InstId`]. The per-kind collections keep declaration order, which is
/// also the order memory variables are emitted in.
#[derive(Debug, Clone, Default)]
pub struct Program {
    vars: Vec<Variable>,
    instrs: Vec<Instruction>,
    registers: Vec<VarId>,
    memory: Vec<VarId>,
    labels: Vec<VarId>,
    constants: Vec<VarId>,
}

impl Program {
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }

    pub fn instr(&self, id: InstId) -> &Instruction {
        &self.instrs[id.0]
    }

    pub(crate) fn instr_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.instrs[id.0]
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Instructions in creation order.
    pub fn instructions(&self) -> impl DoubleEndedIterator<Item = (InstId, &Instruction)> + '_ {
        self.instrs.iter().enumerate().map(|(i, inst)| (InstId(i), inst))
    }

    pub fn inst_ids(&self) -> impl DoubleEndedIterator<Item = InstId> {
        (0..self.instrs.len()).map(InstId)
    }

    /// Register variables, ordered by position.
    pub fn registers(&self) -> &[VarId] {
        &self.registers
    }

    pub fn memory_vars(&self) -> &[VarId] {
        &self.memory
    }

    pub fn labels(&self) -> &[VarId] {
        &self.labels
    }

    pub fn constants(&self) -> &[VarId] {
        &self.constants
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Register variable holding matrix position `pos`.
    pub fn register_at(&self, pos: usize) -> VarId {
        self.registers[pos]
    }

    /// The function entry marker, if there is one.
    pub fn entry(&self) -> Option<InstId> {
        self.instructions().find(|(_, i)| i.is_entry()).map(|(id, _)| id)
    }

    /// First instruction carrying `label`.
    pub fn find_labeled(&self, label: VarId) -> Option<InstId> {
        self.instructions()
            .find(|(_, i)| i.label == Some(label))
            .map(|(id, _)| id)
    }

    /// Label operand a branch jumps to.
    pub fn branch_target(&self, id: InstId) -> Option<VarId> {
        let inst = self.instr(id);
        if inst.branch_kind() == BranchKind::None {
            return None;
        }
        inst.src
            .iter()
            .rev()
            .copied()
            .find(|v| self.var(*v).kind == VarKind::Label)
    }

    /// Look up a variable by name, searching every kind.
    pub fn find_var(&self, name: &str) -> Option<VarId> {
        self.vars.iter().position(|v| v.name == name).map(VarId)
    }

    /// Add a control edge. Returns `false` if it already existed.
    pub(crate) fn link(&mut self, pred: InstId, succ: InstId) -> bool {
        let added = self.instrs[pred.0].succs.insert(succ);
        self.instrs[succ.0].preds.insert(pred);
        added
    }

    pub(crate) fn clear_edges(&mut self) {
        for inst in &mut self.instrs {
            inst.succs.clear();
            inst.preds.clear();
        }
    }

    /// Recompute use/def from the register operands of every instruction.
    pub(crate) fn compute_use_def(&mut self) {
        let vars = &self.vars;
        for inst in &mut self.instrs {
            inst.uses = inst.src.iter().copied().filter(|v| vars[v.0].is_register()).collect();
            inst.defs = inst.dst.iter().copied().filter(|v| vars[v.0].is_register()).collect();
        }
    }

    pub(crate) fn set_assignment(&mut self, var: VarId, reg: Option<PhysReg>) {
        self.vars[var.0].assignment = reg;
    }

    pub(crate) fn clear_assignments(&mut self) {
        for var in &mut self.vars {
            var.assignment = None;
        }
    }

    /// Total number of control edges.
    pub fn edge_count(&self) -> usize {
        self.instrs.iter().map(|i| i.succs.len()).sum()
    }
}

/// Monotonic counter handing out positions.
#[derive(Debug, Default, Clone)]
pub struct Sequence(usize);

impl Sequence {
    pub fn next(&mut self) -> usize {
        let n = self.0;
        self.0 += 1;
        n
    }

    pub fn peek(&self) -> usize {
        self.0
    }
}

/// Construction session for a [`Program`].
///
/// Owns the instruction and register sequence generators, so positions are
/// dense and unique per program.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    inst_seq: Sequence,
    reg_seq: Sequence,
    constants: HashMap<i32, VarId>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_var(&mut self, kind: VarKind, name: String, value: i32) -> VarId {
        let id = VarId(self.program.vars.len());
        let position = (kind == VarKind::Register).then(|| self.reg_seq.next());
        self.program.vars.push(Variable {
            kind,
            name,
            value,
            position,
            assignment: None,
        });
        id
    }

    pub fn memory(&mut self, name: impl Into<String>, value: i32) -> VarId {
        let id = self.push_var(VarKind::Memory, name.into(), value);
        self.program.memory.push(id);
        id
    }

    pub fn register(&mut self, name: impl Into<String>) -> VarId {
        let id = self.push_var(VarKind::Register, name.into(), 0);
        self.program.registers.push(id);
        id
    }

    /// Create a label that is referenced but not yet defined.
    pub fn label(&mut self, name: impl Into<String>) -> VarId {
        let id = self.push_var(VarKind::Label, name.into(), 0);
        self.program.labels.push(id);
        id
    }

    fn define_label(&mut self, label: VarId) {
        self.program.vars[label.0].value = 1;
    }

    /// Constant with the given literal. One variable per distinct value.
    pub fn constant(&mut self, value: i32) -> VarId {
        if let Some(&id) = self.constants.get(&value) {
            return id;
        }
        let id = self.push_var(VarKind::Constant, value.to_string(), value);
        self.program.constants.push(id);
        self.constants.insert(value, id);
        id
    }

    /// Variable with no kind. Never valid as an instruction operand.
    pub fn untyped(&mut self, name: impl Into<String>) -> VarId {
        self.push_var(VarKind::Untyped, name.into(), -1)
    }

    pub fn var(&self, id: VarId) -> &Variable {
        self.program.var(id)
    }

    pub fn instruction_count(&self) -> usize {
        self.program.instrs.len()
    }

    /// Append the function entry marker carrying `label`.
    pub fn entry(&mut self, label: VarId) -> CompileResult<InstId> {
        self.expect_free_label(label)?;
        self.define_label(label);
        let position = self.inst_seq.next();
        let id = InstId(self.program.instrs.len());
        self.program.instrs.push(Instruction::new(position, None, Some(label)));
        Ok(id)
    }

    /// Append an instruction, checking operands against the opcode shape.
    pub fn instruction(
        &mut self,
        opcode: Opcode,
        dst: &[VarId],
        src: &[VarId],
    ) -> CompileResult<InstId> {
        let info = opcode.info();
        self.check_operands(info.name, "destination", info.dst, dst)?;
        self.check_operands(info.name, "source", info.src, src)?;

        let position = self.inst_seq.next();
        let id = InstId(self.program.instrs.len());
        let mut inst = Instruction::new(position, Some(opcode), None);
        inst.dst = dst.to_vec();
        inst.src = src.to_vec();
        self.program.instrs.push(inst);
        Ok(id)
    }

    /// Attach a label to an already created instruction.
    pub fn attach_label(&mut self, inst: InstId, label: VarId) -> CompileResult<()> {
        self.expect_free_label(label)?;
        self.define_label(label);
        self.program.instrs[inst.0].label = Some(label);
        Ok(())
    }

    pub fn finish(self) -> Program {
        self.program
    }

    /// A label that no instruction carries yet.
    fn expect_free_label(&self, label: VarId) -> CompileResult<()> {
        let var = self.program.var(label);
        if var.kind != VarKind::Label {
            return Err(CompileError::NotALabel {
                name: var.name.clone(),
            });
        }
        if var.is_defined_label() {
            return Err(CompileError::DuplicateLabel {
                name: var.name.clone(),
            });
        }
        Ok(())
    }

    fn check_operands(
        &self,
        opcode: &'static str,
        role: &str,
        expected: &[VarKind],
        got: &[VarId],
    ) -> CompileResult<()> {
        if expected.len() != got.len() {
            return Err(CompileError::OperandMismatch {
                opcode,
                reason: format!("expected {} {role} operands, got {}", expected.len(), got.len()),
            });
        }
        for (slot, (kind, id)) in expected.iter().zip(got).enumerate() {
            let var = self.program.var(*id);
            if var.kind != *kind {
                return Err(CompileError::OperandMismatch {
                    opcode,
                    reason: format!(
                        "{role} operand {} ({}) is a {} variable, expected {}",
                        slot + 1,
                        var.name,
                        var.kind,
                        kind
                    ),
                });
            }
        }
        Ok(())
    }
}
