//! Message-Passing Structure
//!
//! Incoming edges grouped by target node (CSR). Self loops are normalised:
//! any in the edge list are dropped and exactly one is added per node.
//! Each edge carries the symmetric GCN weight `deg(src)^-1/2 * deg(dst)^-1/2`
//! where `deg` is the in-degree including the self loop.

use std::ops::Range;

use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub struct MessageGraph {
    num_nodes: usize,
    /// `offsets[t]..offsets[t + 1]` are the edges into `t`
    offsets: Vec<usize>,
    sources: Vec<usize>,
    norm: Vec<f32>,
}

impl MessageGraph {
    /// Edges are `(source, target)`; out-of-range endpoints are ignored
    pub fn new(num_nodes: usize, edges: &[(usize, usize)]) -> Self {
        let mut pairs: Vec<(usize, usize)> = edges
            .iter()
            .filter(|&&(s, t)| s != t && s < num_nodes && t < num_nodes)
            .map(|&(s, t)| (t, s))
            .chain((0..num_nodes).map(|i| (i, i)))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        let mut offsets = vec![0; num_nodes + 1];
        for &(t, _) in &pairs {
            offsets[t + 1] += 1;
        }
        for i in 0..num_nodes {
            offsets[i + 1] += offsets[i];
        }

        let degree: Vec<f32> = offsets.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
        let norm = pairs
            .iter()
            .map(|&(t, s)| (degree[s] * degree[t]).sqrt().recip())
            .collect();
        let sources = pairs.into_iter().map(|(_, s)| s).collect();

        Self { num_nodes, offsets, sources, norm }
    }

    /// One node with its self loop
    pub fn single() -> Self {
        Self::new(1, &[])
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Edge count including self loops
    pub fn num_edges(&self) -> usize {
        self.sources.len()
    }

    /// Edge ids pointing into `target`
    pub fn incoming(&self, target: usize) -> Range<usize> {
        self.offsets[target]..self.offsets[target + 1]
    }

    pub fn source(&self, edge: usize) -> usize {
        self.sources[edge]
    }

    pub fn norm(&self, edge: usize) -> f32 {
        self.norm[edge]
    }

    pub fn in_degree(&self, target: usize) -> usize {
        self.offsets[target + 1] - self.offsets[target]
    }

    /// `out[t] = sum_e norm_e * h[src_e]` over edges into `t`
    pub fn propagate(&self, h: &Array2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros((self.num_nodes, h.ncols()));
        for t in 0..self.num_nodes {
            let mut row = out.row_mut(t);
            for e in self.incoming(t) {
                row.scaled_add(self.norm[e], &h.row(self.sources[e]));
            }
        }
        out
    }

    /// Adjoint of `propagate`: scatters each target row back to its sources
    pub fn propagate_transposed(&self, grad: &Array2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros((self.num_nodes, grad.ncols()));
        for t in 0..self.num_nodes {
            let g = grad.row(t);
            for e in self.incoming(t) {
                out.row_mut(self.sources[e]).scaled_add(self.norm[e], &g);
            }
        }
        out
    }
}
