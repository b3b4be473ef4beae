//! Cluster extraction and risk filtering

use crate::graph::NodeOrder;
use crate::types::report::HardLabel;
use crate::types::transaction::{AccountId, Label};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accounts grouped by final hard label. Each list keeps node order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterMap(BTreeMap<HardLabel, Vec<AccountId>>);

impl ClusterMap {
    /// Group accounts by their hard label
    pub fn from_assignments(order: &NodeOrder, assignments: &[HardLabel]) -> Self {
        debug_assert_eq!(order.len(), assignments.len());

        let mut clusters: BTreeMap<HardLabel, Vec<AccountId>> = BTreeMap::new();
        for (account, label) in order.iter().zip(assignments) {
            clusters.entry(*label).or_default().push(account);
        }
        Self(clusters)
    }

    /// Sub-map holding only the risk class; empty when nobody carries it
    pub fn risk_cluster(&self, risk_label: Label) -> ClusterMap {
        Self(
            self.0
                .iter()
                .filter(|(label, _)| label.is_class(risk_label))
                .map(|(label, accounts)| (*label, accounts.clone()))
                .collect(),
        )
    }

    /// Risk cluster flattened, in node order
    pub fn risk_accounts(&self, risk_label: Label) -> Vec<AccountId> {
        self.risk_cluster(risk_label).flatten()
    }

    pub fn flatten(&self) -> Vec<AccountId> {
        self.0.values().flatten().copied().collect()
    }

    pub fn get(&self, label: HardLabel) -> Option<&[AccountId]> {
        self.0.get(&label).map(Vec::as_slice)
    }

    pub fn labels(&self) -> impl Iterator<Item = HardLabel> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HardLabel, &Vec<AccountId>)> {
        self.0.iter()
    }

    /// Number of clusters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_accounts(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}
