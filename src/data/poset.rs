//! # Event Poset
//!
//! Directed acyclic graph of cover relations between events. An edge
//! `u -> v` means event `u` must occur before event `v` can occur.
//!
//! Vertices are plain indices `0..p`; the graph is a pair of vertex-indexed
//! adjacency lists (out-edges and mirrored in-edges).

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{HcbnError, Result};

/// Partial order over events, expressed as a DAG of cover relations.
#[derive(Clone, Debug)]
pub struct Poset {
    p: usize,
    out_edges: Vec<Vec<usize>>,
    in_edges: Vec<Vec<usize>>,
}

impl Poset {
    /// Create a poset over `p` events with no relations
    pub fn new(p: usize) -> Self {
        Poset {
            p,
            out_edges: vec![Vec::new(); p],
            in_edges: vec![Vec::new(); p],
        }
    }

    /// Build a poset from a list of cover relations `(u, v)`.
    ///
    /// Rejects vertices outside `0..p` and self-loops. Duplicate edges are
    /// collapsed.
    pub fn from_edges(p: usize, edges: &[(usize, usize)]) -> Result<Self> {
        let mut poset = Poset::new(p);
        for &(u, v) in edges {
            if u >= p || v >= p {
                return Err(HcbnError::shape_mismatch(format!(
                    "edge ({u}, {v}) references a vertex outside 0..{p}"
                )));
            }
            if u == v {
                return Err(HcbnError::shape_mismatch(format!(
                    "self-loop on vertex {u}"
                )));
            }
            if !poset.out_edges[u].contains(&v) {
                poset.out_edges[u].push(v);
                poset.in_edges[v].push(u);
            }
        }
        for adj in poset.out_edges.iter_mut().chain(poset.in_edges.iter_mut()) {
            adj.sort_unstable();
        }
        Ok(poset)
    }

    /// Build a poset from a dense `p x p` adjacency matrix.
    ///
    /// Entry `(u, v) = 1` encodes the cover relation `u -> v`. The matrix
    /// must be square with a zero diagonal and `{0, 1}` entries.
    pub fn from_adjacency(adjacency: &[Vec<u8>]) -> Result<Self> {
        let p = adjacency.len();
        let mut edges = Vec::new();
        for (u, row) in adjacency.iter().enumerate() {
            if row.len() != p {
                return Err(HcbnError::shape_mismatch(format!(
                    "adjacency matrix is not square: row {u} has {} entries, expected {p}",
                    row.len()
                )));
            }
            for (v, &entry) in row.iter().enumerate() {
                match entry {
                    0 => {}
                    1 if u == v => {
                        return Err(HcbnError::shape_mismatch(format!(
                            "adjacency matrix has a nonzero diagonal at {u}"
                        )));
                    }
                    1 => edges.push((u, v)),
                    _ => {
                        return Err(HcbnError::shape_mismatch(format!(
                            "adjacency entry ({u}, {v}) is {entry}, expected 0 or 1"
                        )));
                    }
                }
            }
        }
        Poset::from_edges(p, &edges)
    }

    /// Export the poset as a dense adjacency matrix
    pub fn to_adjacency(&self) -> Vec<Vec<u8>> {
        let mut adjacency = vec![vec![0u8; self.p]; self.p];
        for (u, children) in self.out_edges.iter().enumerate() {
            for &v in children {
                adjacency[u][v] = 1;
            }
        }
        adjacency
    }

    /// Number of events
    pub fn size(&self) -> usize {
        self.p
    }

    /// Number of cover relations
    pub fn n_edges(&self) -> usize {
        self.out_edges.iter().map(|adj| adj.len()).sum()
    }

    /// Direct successors of `v`
    pub fn children(&self, v: usize) -> &[usize] {
        &self.out_edges[v]
    }

    /// Direct predecessors of `v`
    pub fn parents(&self, v: usize) -> &[usize] {
        &self.in_edges[v]
    }

    /// Whether the poset contains a directed cycle
    pub fn has_cycles(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Compute a topological order of the vertices.
    ///
    /// Kahn's algorithm with an ascending-vertex-index tie-break among
    /// ready vertices, so the order is total and deterministic. For every
    /// edge `u -> v` the returned order places `u` before `v`.
    pub fn topological_order(&self) -> Result<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.in_edges.iter().map(|adj| adj.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(v, _)| Reverse(v))
            .collect();

        let mut order = Vec::with_capacity(self.p);
        while let Some(Reverse(v)) = ready.pop() {
            order.push(v);
            for &child in &self.out_edges[v] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        if order.len() != self.p {
            return Err(HcbnError::NotAcyclic);
        }
        Ok(order)
    }

    /// Transitive closure downstream of `u` (excluding `u` itself)
    pub fn successors(&self, u: usize) -> Vec<usize> {
        let mut seen = vec![false; self.p];
        let mut stack: Vec<usize> = self.out_edges[u].to_vec();
        while let Some(v) = stack.pop() {
            if !seen[v] {
                seen[v] = true;
                stack.extend_from_slice(&self.out_edges[v]);
            }
        }
        (0..self.p).filter(|&v| seen[v]).collect()
    }

    /// Remove every transitive edge, keeping the unique minimal edge set
    /// with the same reachability relation.
    ///
    /// An edge `u -> v` is transitive when some longer path `u -> .. -> v`
    /// exists. Only valid on a DAG.
    pub fn transitive_reduction(&mut self) -> Result<()> {
        // Run on a DAG only; the closure walk below does not terminate
        // meaningfully on cycles.
        self.topological_order()?;

        let mut reduced: Vec<Vec<usize>> = vec![Vec::new(); self.p];
        for u in 0..self.p {
            for &v in &self.out_edges[u] {
                if !self.reachable_without_edge(u, v) {
                    reduced[u].push(v);
                }
            }
        }

        let mut in_edges: Vec<Vec<usize>> = vec![Vec::new(); self.p];
        for (u, children) in reduced.iter().enumerate() {
            for &v in children {
                in_edges[v].push(u);
            }
        }
        for adj in in_edges.iter_mut() {
            adj.sort_unstable();
        }
        self.out_edges = reduced;
        self.in_edges = in_edges;
        Ok(())
    }

    /// Whether `v` is reachable from `u` along a path that does not take
    /// the direct edge `u -> v` as its first step.
    fn reachable_without_edge(&self, u: usize, v: usize) -> bool {
        let mut seen = vec![false; self.p];
        let mut stack: Vec<usize> = self.out_edges[u]
            .iter()
            .copied()
            .filter(|&w| w != v)
            .collect();
        while let Some(w) = stack.pop() {
            if w == v {
                return true;
            }
            if !seen[w] {
                seen[w] = true;
                stack.extend_from_slice(&self.out_edges[w]);
            }
        }
        false
    }
}
