//! Label spreading over the affinity matrix
//!
//! Implements the iteration of Zhou et al. (2004):
//!
//! ```text
//! S      = D^-1/2 A D^-1/2
//! F(0)   = Y
//! F(t+1) = alpha * S * F(t) + (1 - alpha) * Y
//! ```
//!
//! `Y` holds one one-hot row per labeled account (columns are the sorted
//! distinct classes) and zero rows for unknown accounts. Iteration stops
//! after `max_iter` updates or once the summed absolute change of an update
//! drops below `tol`. The hard label of a row is its argmax, ties going to
//! the lowest column; a row with no positive entry is [`HardLabel::NoEvidence`].
//!
//! Cost is O(|V|^2 * C) per iteration and O(|V|^2) memory for `S`.

use crate::error::{DetectionError, Result};
use crate::graph::{AffinityMatrix, LabelVector};
use crate::types::report::{HardLabel, PropagationSummary};
use crate::types::transaction::Label;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Label spreading parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadingParams {
    /// Weight of propagated signal against the initial labels, in (0, 1)
    pub alpha: f64,
    /// Maximum number of updates
    pub max_iter: usize,
    /// Convergence threshold on the L1 change of one update
    pub tol: f64,
}

impl Default for SpreadingParams {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            max_iter: 30,
            tol: 1e-3,
        }
    }
}

impl SpreadingParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(DetectionError::InvalidParameter(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.max_iter == 0 {
            return Err(DetectionError::InvalidParameter(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(DetectionError::InvalidParameter(format!(
                "tol must be positive, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

/// Outcome of a propagation run
#[derive(Debug, Clone)]
pub struct Propagation {
    /// Final soft label matrix, |V| x C
    pub soft: Array2<f64>,
    /// Class value of each column of `soft`
    pub classes: Vec<Label>,
    /// Hard label per account, in node order
    pub hard: Vec<HardLabel>,
    /// Accounts that carried a known label
    pub known_labels: usize,
    pub iterations: usize,
    pub converged: bool,
    pub final_delta: f64,
}

impl Propagation {
    pub fn has_known_labels(&self) -> bool {
        !self.classes.is_empty()
    }

    pub fn summary(&self) -> PropagationSummary {
        PropagationSummary {
            classes: self.classes.clone(),
            known_labels: self.known_labels,
            iterations: self.iterations,
            converged: self.converged,
            final_delta: self.final_delta,
        }
    }
}

/// Semi-supervised label spreading propagator
#[derive(Debug, Clone)]
pub struct LabelSpreading {
    params: SpreadingParams,
}

impl LabelSpreading {
    pub fn new(params: SpreadingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SpreadingParams {
        &self.params
    }

    /// Spread `labels` across `affinity`. Both must be indexed by the same
    /// node order.
    pub fn propagate(&self, affinity: &AffinityMatrix, labels: &LabelVector) -> Propagation {
        assert_eq!(
            affinity.len(),
            labels.len(),
            "affinity matrix and label vector disagree on node count"
        );

        let classes = labels.classes();
        let known_labels = labels.known_count();
        let y = Self::initial_labels(labels, &classes);

        if classes.is_empty() || labels.is_empty() {
            if !labels.is_empty() {
                warn!(
                    nodes = labels.len(),
                    "No known labels, every account resolves to no-evidence"
                );
            }
            return Propagation {
                hard: vec![HardLabel::NoEvidence; labels.len()],
                soft: y,
                classes,
                known_labels,
                iterations: 0,
                converged: true,
                final_delta: 0.0,
            };
        }

        let s = Self::normalized(affinity);
        let alpha = self.params.alpha;
        let y_static = &y * (1.0 - alpha);

        let mut f = y;
        let mut iterations = 0;
        let mut converged = false;
        let mut final_delta = 0.0;

        while iterations < self.params.max_iter {
            let next = s.dot(&f) * alpha + &y_static;
            final_delta = (&next - &f).mapv(f64::abs).sum();
            f = next;
            iterations += 1;

            debug!(iteration = iterations, delta = final_delta, "Label spreading step");

            if final_delta < self.params.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            warn!(
                iterations = iterations,
                final_delta = final_delta,
                tol = self.params.tol,
                "Label spreading hit the iteration cap before converging"
            );
        }

        let hard = f
            .rows()
            .into_iter()
            .map(|row| Self::hard_label(row, &classes))
            .collect();

        Propagation {
            soft: f,
            classes,
            hard,
            known_labels,
            iterations,
            converged,
            final_delta,
        }
    }

    /// `D^-1/2 A D^-1/2`, with zero rows and columns for isolated accounts
    fn normalized(affinity: &AffinityMatrix) -> Array2<f64> {
        let inv_sqrt = affinity
            .degrees()
            .mapv(|d| if d > 0.0 { 1.0 / d.sqrt() } else { 0.0 });

        let mut s = affinity.matrix().clone();
        for ((i, j), value) in s.indexed_iter_mut() {
            *value *= inv_sqrt[i] * inv_sqrt[j];
        }
        s
    }

    fn initial_labels(labels: &LabelVector, classes: &[Label]) -> Array2<f64> {
        let mut y = Array2::<f64>::zeros((labels.len(), classes.len()));
        for (row, label) in labels.as_slice().iter().enumerate() {
            if let Some(col) = label.and_then(|l| classes.binary_search(&l).ok()) {
                y[[row, col]] = 1.0;
            }
        }
        y
    }

    fn hard_label(row: ArrayView1<f64>, classes: &[Label]) -> HardLabel {
        let mut best: Option<(usize, f64)> = None;
        for (col, &value) in row.iter().enumerate() {
            // strict comparison keeps the lowest column on ties
            if value > 0.0 && best.map_or(true, |(_, b)| value > b) {
                best = Some((col, value));
            }
        }
        best.map_or(HardLabel::NoEvidence, |(col, _)| HardLabel::Class(classes[col]))
    }
}

impl Default for LabelSpreading {
    fn default() -> Self {
        Self {
            params: SpreadingParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AccountGraph, GraphOptions, LabelAnchor};
    use crate::types::transaction::TransactionRecord;
    use ndarray::array;

    fn run(records: &[TransactionRecord], params: SpreadingParams) -> (AccountGraph, Propagation) {
        let graph = AccountGraph::build(records, &GraphOptions::default()).unwrap();
        let labels = LabelVector::build(records, graph.node_order(), LabelAnchor::Source);
        let affinity = AffinityMatrix::from_graph(&graph);
        let propagation = LabelSpreading::new(params).unwrap().propagate(&affinity, &labels);
        (graph, propagation)
    }

    #[test]
    fn test_param_validation() {
        for alpha in [0.0, 1.0, -0.5, f64::NAN] {
            let params = SpreadingParams { alpha, ..Default::default() };
            assert!(LabelSpreading::new(params).is_err(), "alpha {alpha} accepted");
        }
        let params = SpreadingParams { max_iter: 0, ..Default::default() };
        assert!(params.validate().is_err());
        let params = SpreadingParams { tol: 0.0, ..Default::default() };
        assert!(params.validate().is_err());
        assert!(SpreadingParams::default().validate().is_ok());
    }

    #[test]
    fn test_symmetric_normalization() {
        // path 0 - 1 - 2 plus isolated 3
        let records = vec![
            TransactionRecord::new(1, 1, 2, 1.0, Some(1)),
            TransactionRecord::new(2, 2, 3, 1.0, None),
            TransactionRecord::new(4, 4, 4, 1.0, None),
        ];
        let graph = AccountGraph::build(&records, &GraphOptions::default()).unwrap();
        let s = LabelSpreading::normalized(&AffinityMatrix::from_graph(&graph));
        let h = 1.0 / 2f64.sqrt();

        let expected = array![
            [0.0, h, 0.0, 0.0],
            [h, 0.0, h, 0.0],
            [0.0, h, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
        ];
        assert!((&s - &expected).mapv(f64::abs).sum() < 1e-12);
    }

    #[test]
    fn test_first_update_matches_formula() {
        let records = vec![
            TransactionRecord::new(1, 1, 2, 1.0, Some(1)),
            TransactionRecord::new(2, 2, 3, 1.0, None),
        ];
        let params = SpreadingParams { max_iter: 1, ..Default::default() };
        let (_, propagation) = run(&records, params);
        let h = 1.0 / 2f64.sqrt();

        // single class column: F(1) = 0.2 * S * Y + 0.8 * Y
        assert_eq!(propagation.classes, vec![1]);
        assert!((propagation.soft[[0, 0]] - 0.8).abs() < 1e-12);
        assert!((propagation.soft[[1, 0]] - 0.2 * h).abs() < 1e-12);
        assert_eq!(propagation.soft[[2, 0]], 0.0);
        assert_eq!(propagation.iterations, 1);
        assert!(!propagation.converged);
        // node 3 has not been reached yet
        assert_eq!(propagation.hard[2], HardLabel::NoEvidence);
    }

    #[test]
    fn test_converges_on_path() {
        let records = vec![
            TransactionRecord::new(1, 10, 20, 500.0, Some(1)),
            TransactionRecord::new(2, 20, 30, 700.0, None),
            TransactionRecord::new(3, 40, 50, 300.0, Some(0)),
        ];
        let (_, propagation) = run(&records, SpreadingParams::default());

        assert!(propagation.converged);
        assert!(propagation.iterations < 30);
        assert!(propagation.final_delta < 1e-3);
        assert_eq!(
            propagation.hard,
            vec![
                HardLabel::Class(1),
                HardLabel::Class(1),
                HardLabel::Class(1),
                HardLabel::Class(0),
                HardLabel::Class(0),
            ]
        );
    }

    #[test]
    fn test_tie_goes_to_lowest_class() {
        let classes = [0, 1, 2];

        assert_eq!(
            LabelSpreading::hard_label(array![0.4, 0.4, 0.1].view(), &classes),
            HardLabel::Class(0)
        );
        assert_eq!(
            LabelSpreading::hard_label(array![0.1, 0.3, 0.3].view(), &classes),
            HardLabel::Class(1)
        );
        assert_eq!(
            LabelSpreading::hard_label(array![0.0, 0.0, 0.0].view(), &classes),
            HardLabel::NoEvidence
        );
    }

    #[test]
    fn test_balanced_middle_account_is_split() {
        // 2 sits between a class-0 and a class-1 account at equal distance
        let records = vec![
            TransactionRecord::new(1, 1, 2, 1.0, Some(1)),
            TransactionRecord::new(3, 3, 2, 1.0, Some(0)),
        ];
        let (graph, propagation) = run(&records, SpreadingParams::default());
        let middle = graph.node_order().position(2).unwrap();
        let row = propagation.soft.row(middle);

        assert!(row[0] > 0.0);
        assert!((row[0] - row[1]).abs() < 1e-12);
        assert_eq!(propagation.hard[0], HardLabel::Class(1));
        assert_eq!(propagation.hard[2], HardLabel::Class(0));
    }

    #[test]
    fn test_no_known_labels_is_vacuous() {
        let records = vec![
            TransactionRecord::new(1, 1, 2, 1.0, None),
            TransactionRecord::new(2, 2, 3, 1.0, None),
        ];
        let (_, propagation) = run(&records, SpreadingParams::default());

        assert!(!propagation.has_known_labels());
        assert_eq!(propagation.iterations, 0);
        assert_eq!(propagation.soft.dim(), (3, 0));
        assert!(propagation.hard.iter().all(|h| *h == HardLabel::NoEvidence));
    }

    #[test]
    fn test_non_convergence_keeps_latest() {
        let records = vec![
            TransactionRecord::new(1, 1, 2, 1.0, Some(1)),
            TransactionRecord::new(2, 2, 3, 1.0, None),
            TransactionRecord::new(3, 3, 4, 1.0, None),
        ];
        let params = SpreadingParams {
            alpha: 0.99,
            max_iter: 3,
            tol: 1e-12,
        };
        let (_, propagation) = run(&records, params);

        assert!(!propagation.converged);
        assert_eq!(propagation.iterations, 3);
        assert!(propagation.final_delta > 0.0);
        assert_eq!(propagation.hard.len(), 4);
    }

    #[test]
    fn test_empty_input() {
        let (_, propagation) = run(&[], SpreadingParams::default());

        assert!(propagation.hard.is_empty());
        assert!(propagation.converged);
    }
}
