//! Interference graph over register variables.
//!
//! The graph is a symmetric boolean adjacency matrix indexed by register
//! position. Two rules are available:
//!
//! - [`InterferenceRule::DefLiveOut`]: at instruction *n*, a variable *v*
//!   defined by *n* that is still in out[n] conflicts with every other
//!   variable in out[n]. This is the rule the pipeline uses.
//! - [`InterferenceRule::AllLive`]: any two variables that appear together in
//!   some in[n] or out[n] conflict. Useful to see which pairs the first rule
//!   does not connect.

use super::ir::{Program, VarId};
use std::collections::BTreeSet;
use std::fmt;

/// Which pairs of live variables get an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterferenceRule {
    #[default]
    DefLiveOut,
    AllLive,
}

/// Symmetric adjacency matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterferenceGraph {
    size: usize,
    matrix: Vec<bool>,
}

impl InterferenceGraph {
    /// Graph with `size` nodes and no edges.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            matrix: vec![false; size * size],
        }
    }

    /// Build the graph of `program` from its live-out (and for
    /// [`InterferenceRule::AllLive`], live-in) sets.
    pub fn build(program: &Program, rule: InterferenceRule) -> Self {
        let mut graph = Self::new(program.register_count());

        for (_, inst) in program.instructions() {
            match rule {
                InterferenceRule::DefLiveOut => {
                    for &def in inst.defs() {
                        if !inst.live_out().contains(&def) {
                            continue;
                        }
                        for &other in inst.live_out() {
                            if other != def {
                                graph.add_var_edge(program, def, other);
                            }
                        }
                    }
                }
                InterferenceRule::AllLive => {
                    graph.add_clique(program, inst.live_in());
                    graph.add_clique(program, inst.live_out());
                }
            }
        }

        log::debug!(
            "Interference graph ({rule:?}): {} nodes, {} edges",
            graph.size,
            graph.edge_count()
        );
        graph
    }

    fn add_clique(&mut self, program: &Program, set: &BTreeSet<VarId>) {
        let vars: Vec<VarId> = set.iter().copied().collect();
        for (i, &a) in vars.iter().enumerate() {
            for &b in &vars[i + 1..] {
                self.add_var_edge(program, a, b);
            }
        }
    }

    fn add_var_edge(&mut self, program: &Program, a: VarId, b: VarId) {
        let (Some(pa), Some(pb)) = (program.var(a).position(), program.var(b).position()) else {
            return;
        };
        self.add_edge(pa, pb);
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Add an undirected edge. Self-loops are ignored. Returns `true` if the
    /// edge is new.
    pub fn add_edge(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let added = !self.matrix[a * self.size + b];
        self.matrix[a * self.size + b] = true;
        self.matrix[b * self.size + a] = true;
        added
    }

    pub fn interferes(&self, a: usize, b: usize) -> bool {
        self.matrix[a * self.size + b]
    }

    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let row = &self.matrix[node * self.size..(node + 1) * self.size];
        row.iter().enumerate().filter(|(_, e)| **e).map(|(i, _)| i)
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).count()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.matrix.iter().filter(|&&e| e).count() / 2
    }

    /// Symmetric with an empty diagonal.
    pub fn is_symmetric(&self) -> bool {
        (0..self.size).all(|i| {
            !self.interferes(i, i)
                && (0..self.size).all(|j| self.interferes(i, j) == self.interferes(j, i))
        })
    }

    /// All edges `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.size).flat_map(move |a| {
            self.neighbors(a)
                .filter(move |&b| a < b)
                .map(move |b| (a, b))
        })
    }
}

impl fmt::Display for InterferenceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.size {
            f.write_str("[")?;
            for j in 0..self.size {
                write!(f, " {}", u8::from(self.interferes(i, j)))?;
            }
            f.write_str(" ]\n")?;
        }
        Ok(())
    }
}
