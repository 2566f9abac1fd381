// This module implements register allocation by graph coloring with a fixed palette and no
// spilling. Simplification repeatedly removes, among the nodes still in the graph, the one
// with the highest current degree that is still below K, and pushes it on a stack. When no
// node qualifies the allocation fails with InsufficientRegisters. Selection pops the stack
// and gives each variable the first color not already taken by a colored neighbour in the
// original interference graph. Colors are only written back to the program once every
// variable has one, so a failed allocation never leaves a partial coloring behind.

//! Graph-coloring register allocator.

use super::error::AllocError;
use super::interference::InterferenceGraph;
use super::ir::{Program, VarId};
use super::register_file::{PhysReg, RegisterPalette};

/// Successful coloring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coloring {
    /// Variables in the order simplification removed them.
    pub elimination_order: Vec<VarId>,
    /// Chosen register per variable, indexed by register position.
    pub colors: Vec<PhysReg>,
}

impl Coloring {
    /// Number of distinct registers used.
    pub fn registers_used(&self) -> usize {
        let mut used: Vec<PhysReg> = self.colors.clone();
        used.sort();
        used.dedup();
        used.len()
    }
}

/// Result of an allocation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationStatus {
    Allocated(Coloring),
    Failed(AllocError),
}

impl AllocationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, AllocationStatus::Allocated(_))
    }

    pub fn coloring(&self) -> Option<&Coloring> {
        match self {
            AllocationStatus::Allocated(c) => Some(c),
            AllocationStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AllocError> {
        match self {
            AllocationStatus::Allocated(_) => None,
            AllocationStatus::Failed(e) => Some(e),
        }
    }
}

/// Colors an interference graph with the registers of a palette.
pub struct Allocator<'p> {
    palette: &'p RegisterPalette,
}

impl<'p> Allocator<'p> {
    pub fn new(palette: &'p RegisterPalette) -> Self {
        Self { palette }
    }

    /// Color `graph` and, on success, record the assignment of every register
    /// variable in `program`. On failure all assignments are cleared.
    pub fn allocate(&self, program: &mut Program, graph: &InterferenceGraph) -> AllocationStatus {
        program.clear_assignments();

        let result = self
            .simplify(graph)
            .and_then(|stack| self.select(program, graph, &stack).map(|colors| (stack, colors)));

        match result {
            Ok((stack, colors)) => {
                for (pos, reg) in colors.iter().enumerate() {
                    program.set_assignment(program.register_at(pos), Some(*reg));
                }
                let elimination_order = stack.iter().map(|&pos| program.register_at(pos)).collect();
                let coloring = Coloring {
                    elimination_order,
                    colors,
                };
                log::info!(
                    "Allocated {} variables into {} of {} registers",
                    coloring.colors.len(),
                    coloring.registers_used(),
                    self.palette.size()
                );
                AllocationStatus::Allocated(coloring)
            }
            Err(err) => {
                log::info!("Register allocation failed: {err}");
                AllocationStatus::Failed(err)
            }
        }
    }

    /// Elimination order of register positions. The last element is colored
    /// first.
    pub fn simplify(&self, graph: &InterferenceGraph) -> Result<Vec<usize>, AllocError> {
        let k = self.palette.size();
        let n = graph.size();
        let mut removed = vec![false; n];
        let mut stack = Vec::with_capacity(n);

        for remaining in (1..=n).rev() {
            let degree = |node: usize| graph.neighbors(node).filter(|&m| !removed[m]).count();

            // Highest degree below K; the first (lowest position) wins ties.
            let mut best: Option<(usize, usize)> = None;
            for node in (0..n).filter(|&i| !removed[i]) {
                let d = degree(node);
                if d < k && best.map_or(true, |(_, bd)| d > bd) {
                    best = Some((node, d));
                }
            }

            let Some((node, d)) = best else {
                return Err(AllocError::InsufficientRegisters {
                    remaining,
                    palette: k,
                });
            };
            log::trace!("simplify: remove position {node} (degree {d})");
            removed[node] = true;
            stack.push(node);
        }
        Ok(stack)
    }

    /// Pop `stack` and pick the first free color for each variable. Returns
    /// colors indexed by register position.
    pub fn select(
        &self,
        program: &Program,
        graph: &InterferenceGraph,
        stack: &[usize],
    ) -> Result<Vec<PhysReg>, AllocError> {
        let mut colors: Vec<Option<PhysReg>> = vec![None; graph.size()];

        for (i, &node) in stack.iter().rev().enumerate() {
            let reg = if i == 0 {
                self.palette.regs().next()
            } else {
                self.palette
                    .regs()
                    .find(|reg| graph.neighbors(node).all(|m| colors[m] != Some(*reg)))
            };
            let Some(reg) = reg else {
                return Err(AllocError::ColoringFailed {
                    name: program.var(program.register_at(node)).name().to_string(),
                });
            };
            log::trace!(
                "select: {} -> {}",
                program.var(program.register_at(node)).name(),
                self.palette.name(reg).unwrap_or("?")
            );
            colors[node] = Some(reg);
        }

        // Every position is on the stack exactly once.
        Ok(colors.into_iter().flatten().collect())
    }
}

/// Whether no two interfering register variables share an assignment and
/// every register variable has one inside the palette.
pub fn is_valid_coloring(
    program: &Program,
    graph: &InterferenceGraph,
    palette: &RegisterPalette,
) -> bool {
    let assigned: Vec<Option<PhysReg>> = program
        .registers()
        .iter()
        .map(|&v| program.var(v).assignment())
        .collect();
    let all_in_palette = assigned.iter().all(|a| a.is_some_and(|r| palette.contains(r)));
    all_in_palette && graph.edges().all(|(a, b)| assigned[a] != assigned[b])
}
