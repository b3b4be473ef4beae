//! End-to-end ring detection over one batch of records

use crate::config::DetectionConfig;
use crate::error::Result;
use crate::graph::{AccountGraph, AffinityMatrix, LabelVector};
use crate::propagation::{ClusterMap, LabelSpreading, Propagation};
use crate::types::report::{DetectionWarning, RiskReport};
use crate::types::transaction::{validate_records, AccountId, Label, RawRecord, TransactionRecord};
use chrono::Utc;
use tracing::{debug, info};

/// Everything computed for one batch
#[derive(Debug, Clone)]
pub struct Detection {
    pub graph: AccountGraph,
    pub labels: LabelVector,
    pub propagation: Propagation,
    pub clusters: ClusterMap,
    pub risk_label: Label,
}

impl Detection {
    pub fn risk_cluster(&self) -> ClusterMap {
        self.clusters.risk_cluster(self.risk_label)
    }

    pub fn risk_accounts(&self) -> Vec<AccountId> {
        self.clusters.risk_accounts(self.risk_label)
    }

    pub fn warnings(&self) -> Vec<DetectionWarning> {
        let mut warnings = Vec::new();
        if !self.graph.is_empty() && !self.propagation.has_known_labels() {
            warnings.push(DetectionWarning::NoKnownLabels);
        }
        if !self.propagation.converged {
            warnings.push(DetectionWarning::NonConverged {
                iterations: self.propagation.iterations,
                final_delta: self.propagation.final_delta,
            });
        }
        if self.graph.skipped_self_loops() > 0 {
            warnings.push(DetectionWarning::SelfLoopsSkipped {
                count: self.graph.skipped_self_loops(),
            });
        }
        warnings
    }

    pub fn to_report(&self, batch_id: &str) -> RiskReport {
        let risk_clusters = self.risk_cluster();
        RiskReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            batch_id: batch_id.to_string(),
            risk_label: self.risk_label,
            risk_accounts: risk_clusters.flatten(),
            risk_clusters,
            clusters: self.clusters.clone(),
            graph: self.graph.snapshot(),
            propagation: self.propagation.summary(),
            warnings: self.warnings(),
            timestamp: Utc::now(),
        }
    }
}

/// Runs graph build, label resolution, spreading and clustering.
///
/// Holds only immutable settings; share one instance across workers.
#[derive(Debug, Clone)]
pub struct RingDetector {
    config: DetectionConfig,
    spreading: LabelSpreading,
}

impl RingDetector {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        let spreading = LabelSpreading::new(config.spreading_params())?;
        Ok(Self { config, spreading })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Validate wire records, then detect
    pub fn detect_raw(&self, records: &[RawRecord]) -> Result<Detection> {
        let records = validate_records(records)?;
        self.detect(&records)
    }

    pub fn detect(&self, records: &[TransactionRecord]) -> Result<Detection> {
        debug!(records = records.len(), "Label propagation started");

        let graph = AccountGraph::build(records, &self.config.graph_options())?;
        let labels = LabelVector::build(records, graph.node_order(), self.config.label_anchor);
        let affinity = AffinityMatrix::from_graph(&graph);
        let propagation = self.spreading.propagate(&affinity, &labels);
        let clusters = ClusterMap::from_assignments(graph.node_order(), &propagation.hard);

        let detection = Detection {
            graph,
            labels,
            propagation,
            clusters,
            risk_label: self.config.risk_label,
        };

        let risk_accounts = detection.risk_accounts();
        info!(
            accounts = detection.graph.node_count(),
            edges = detection.graph.edge_count(),
            known_labels = detection.labels.known_count(),
            iterations = detection.propagation.iterations,
            converged = detection.propagation.converged,
            clusters = detection.clusters.len(),
            risk_accounts = ?risk_accounts,
            "Risk clusters detected"
        );

        Ok(detection)
    }
}

impl Default for RingDetector {
    fn default() -> Self {
        Self {
            config: DetectionConfig::default(),
            spreading: LabelSpreading::default(),
        }
    }
}
