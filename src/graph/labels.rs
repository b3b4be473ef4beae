//! Known-label resolution aligned to the account graph

use super::builder::NodeOrder;
use crate::types::transaction::{AccountId, Label, TransactionRecord, UNKNOWN_LABEL};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

/// Which account a record's label describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelAnchor {
    /// The sending account (`from_acct`)
    #[default]
    Source,
    /// The account whose id equals the record's `id`
    RecordId,
}

impl LabelAnchor {
    fn key(&self, record: &TransactionRecord) -> AccountId {
        match self {
            LabelAnchor::Source => record.from_acct,
            LabelAnchor::RecordId => record.id,
        }
    }
}

/// One optional known label per account, in [`NodeOrder`] positions
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVector {
    labels: Vec<Option<Label>>,
}

impl LabelVector {
    /// Resolve labels by grouping records on the anchor key.
    ///
    /// The first record of each group decides, even when its label is
    /// unknown: later records never vote or override. Keys that are not
    /// accounts in `order` are ignored.
    pub fn build(records: &[TransactionRecord], order: &NodeOrder, anchor: LabelAnchor) -> Self {
        let mut first_seen: HashMap<AccountId, Option<Label>> = HashMap::new();
        for record in records {
            first_seen.entry(anchor.key(record)).or_insert(record.label);
        }

        let labels = order
            .iter()
            .map(|account| first_seen.get(&account).copied().flatten())
            .collect();

        Self { labels }
    }

    pub fn get(&self, position: usize) -> Option<Label> {
        self.labels.get(position).copied().flatten()
    }

    pub fn as_slice(&self) -> &[Option<Label>] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn known_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }

    /// Distinct known labels, ascending; these are the propagation columns
    pub fn classes(&self) -> Vec<Label> {
        self.labels
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Labels with unknowns as the `-1` sentinel
    pub fn to_sentinel_vec(&self) -> Vec<Label> {
        self.labels
            .iter()
            .map(|l| l.unwrap_or(UNKNOWN_LABEL))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{AccountGraph, GraphOptions};

    fn build(records: &[TransactionRecord], anchor: LabelAnchor) -> LabelVector {
        let graph = AccountGraph::build(records, &GraphOptions::default()).unwrap();
        LabelVector::build(records, graph.node_order(), anchor)
    }

    #[test]
    fn test_source_anchor_labels_sender() {
        let records = vec![
            TransactionRecord::new(1, 10, 20, 500.0, Some(1)),
            TransactionRecord::new(2, 20, 30, 700.0, None),
            TransactionRecord::new(3, 40, 50, 300.0, Some(0)),
        ];
        let labels = build(&records, LabelAnchor::Source);

        assert_eq!(labels.as_slice(), &[Some(1), None, None, Some(0), None]);
        assert_eq!(labels.to_sentinel_vec(), vec![1, -1, -1, 0, -1]);
        assert_eq!(labels.classes(), vec![0, 1]);
        assert_eq!(labels.known_count(), 2);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let records = vec![
            TransactionRecord::new(10, 10, 20, 1.0, Some(0)),
            TransactionRecord::new(10, 10, 30, 1.0, Some(1)),
            TransactionRecord::new(20, 20, 30, 1.0, None),
            TransactionRecord::new(20, 20, 10, 1.0, Some(1)),
        ];
        let labels = build(&records, LabelAnchor::Source);

        // 10 keeps its first label; 20's first record is unlabeled so it stays unknown
        assert_eq!(labels.as_slice(), &[Some(0), None, None]);
    }

    #[test]
    fn test_record_id_anchor() {
        let records = vec![
            TransactionRecord::new(20, 10, 20, 1.0, Some(1)),
            TransactionRecord::new(99, 20, 30, 1.0, Some(0)),
            TransactionRecord::new(20, 30, 10, 1.0, Some(0)),
        ];
        let labels = build(&records, LabelAnchor::RecordId);

        // id 99 is not an account; id 20 resolves to its first record
        assert_eq!(labels.as_slice(), &[None, Some(1), None]);
        assert_eq!(labels.classes(), vec![1]);
    }

    #[test]
    fn test_label_vector_follows_node_order() {
        let records = vec![
            TransactionRecord::new(7, 7, 3, 1.0, Some(1)),
            TransactionRecord::new(3, 3, 5, 1.0, Some(0)),
        ];
        let graph = AccountGraph::build(&records, &GraphOptions::default()).unwrap();
        let labels = LabelVector::build(&records, graph.node_order(), LabelAnchor::Source);

        for (position, account) in graph.node_order().iter().enumerate() {
            let expected = records.iter().find(|r| r.from_acct == account).and_then(|r| r.label);
            assert_eq!(labels.get(position), expected);
        }
        assert_eq!(labels.len(), graph.node_count());
    }
}
