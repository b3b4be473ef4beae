//! Binary affinity matrix over the account graph

use super::builder::AccountGraph;
use ndarray::{Array1, Array2, Axis};

/// Dense symmetric 0/1 adjacency matrix in [`NodeOrder`](super::NodeOrder)
/// positions. Edge amounts are deliberately dropped: connectivity alone
/// is the propagation signal.
#[derive(Debug, Clone, PartialEq)]
pub struct AffinityMatrix {
    matrix: Array2<f64>,
}

impl AffinityMatrix {
    pub fn from_graph(graph: &AccountGraph) -> Self {
        let n = graph.node_count();
        let mut matrix = Array2::<f64>::zeros((n, n));

        for (i, j) in graph.edge_positions() {
            // builder never emits self-loops
            debug_assert_ne!(i, j);
            matrix[[i, j]] = 1.0;
            matrix[[j, i]] = 1.0;
        }

        Self { matrix }
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn is_edge(&self, i: usize, j: usize) -> bool {
        self.matrix.get((i, j)).is_some_and(|&v| v != 0.0)
    }

    /// Row sums
    pub fn degrees(&self) -> Array1<f64> {
        self.matrix.sum_axis(Axis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::GraphOptions;
    use crate::types::transaction::TransactionRecord;

    fn graph(pairs: &[(i64, i64)]) -> AccountGraph {
        let records: Vec<_> = pairs
            .iter()
            .map(|&(a, b)| TransactionRecord::new(a, a, b, 100.0, None))
            .collect();
        AccountGraph::build(&records, &GraphOptions::default()).unwrap()
    }

    #[test]
    fn test_affinity_is_symmetric_binary() {
        let g = graph(&[(1, 2), (2, 3), (2, 3), (3, 1), (4, 5)]);
        let a = AffinityMatrix::from_graph(&g);
        let m = a.matrix();

        assert_eq!(a.len(), 5);
        assert_eq!(*m, m.t());
        assert!(m.iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(m.diag().iter().all(|&v| v == 0.0));
        assert_eq!(a.degrees().to_vec(), vec![2.0, 2.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_affinity_matches_node_order() {
        // accounts deliberately out of numeric order
        let g = graph(&[(50, 7), (7, 300), (12, 50), (300, 12), (99, 1)]);
        let a = AffinityMatrix::from_graph(&g);
        let order = g.node_order();

        for (i, u) in order.iter().enumerate() {
            for (j, v) in order.iter().enumerate() {
                assert_eq!(
                    a.is_edge(i, j),
                    g.has_edge(u, v) && u != v,
                    "mismatch at ({u}, {v})"
                );
            }
        }
    }

    #[test]
    fn test_empty_graph() {
        let a = AffinityMatrix::from_graph(&graph(&[]));

        assert!(a.is_empty());
        assert_eq!(a.len(), 0);
    }
}
