//! Edge Construction
//!
//! Two strategies:
//! - `Synthetic`: sequential neighbourhood (i <-> i+1..=3) plus two random
//!   out-edges per node. Fast, ignores feature space.
//! - `Knn`: k nearest neighbours in scaled feature space, both directions.

use std::collections::BTreeSet;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub const SYNTHETIC_EDGE_SEED: u64 = 42;
pub const SEQUENTIAL_NEIGHBOURS: usize = 3;
pub const RANDOM_NEIGHBOURS: usize = 2;
pub const DEFAULT_KNN_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeStrategy {
    Synthetic { seed: u64 },
    Knn { k: usize },
}

impl Default for EdgeStrategy {
    fn default() -> Self {
        EdgeStrategy::Synthetic { seed: SYNTHETIC_EDGE_SEED }
    }
}

impl std::fmt::Display for EdgeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeStrategy::Synthetic { seed } => write!(f, "synthetic (seed {})", seed),
            EdgeStrategy::Knn { k } => write!(f, "knn (k = {})", k),
        }
    }
}

impl EdgeStrategy {
    /// Directed `(source, target)` edges, deduplicated and sorted
    pub fn build(&self, features: ArrayView2<'_, f32>) -> Vec<(usize, usize)> {
        let n = features.nrows();
        if n == 0 {
            return Vec::new();
        }

        let edges = match *self {
            EdgeStrategy::Synthetic { seed } => synthetic_edges(n, seed),
            EdgeStrategy::Knn { k } => knn_edges(features, k),
        };

        if edges.is_empty() {
            log::warn!("Edge construction produced no edges, using ring fallback");
            return (0..n).map(|i| (i, (i + 1) % n)).collect();
        }

        edges.into_iter().collect()
    }
}

fn synthetic_edges(n: usize, seed: u64) -> BTreeSet<(usize, usize)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut edges = BTreeSet::new();
    let random_count = RANDOM_NEIGHBOURS.min(n - 1);

    for i in 0..n {
        for j in (i + 1)..=(i + SEQUENTIAL_NEIGHBOURS).min(n - 1) {
            edges.insert((i, j));
            edges.insert((j, i));
        }

        // Distinct draws over all nodes; a draw of `i` itself is skipped
        for r in rand::seq::index::sample(&mut rng, n, random_count) {
            if r != i {
                edges.insert((i, r));
            }
        }
    }

    edges
}

fn knn_edges(features: ArrayView2<'_, f32>, k: usize) -> BTreeSet<(usize, usize)> {
    let n = features.nrows();
    let k = k.min(n - 1);
    let mut edges = BTreeSet::new();
    if k == 0 {
        return edges;
    }

    let mut distances: Vec<(f32, usize)> = Vec::with_capacity(n);
    for i in 0..n {
        let row = features.row(i);
        distances.clear();
        distances.extend((0..n).filter(|&j| j != i).map(|j| {
            let d: f32 = row
                .iter()
                .zip(features.row(j).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (d, j)
        }));

        distances.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        for &(_, j) in &distances[..k] {
            edges.insert((i, j));
            edges.insert((j, i));
        }
    }

    edges
}
