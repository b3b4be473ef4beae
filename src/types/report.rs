//! Risk report data structures

use super::transaction::{AccountId, Label};
use crate::propagation::clusters::ClusterMap;
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const NO_EVIDENCE_TAG: &str = "no_evidence";

/// Final label assigned to an account after propagation.
///
/// `NoEvidence` marks accounts that received no propagated signal at all
/// (isolated and unlabeled, or every class absent). It sorts after every
/// real class and is never confused with class `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HardLabel {
    Class(Label),
    NoEvidence,
}

impl HardLabel {
    pub fn class(&self) -> Option<Label> {
        match self {
            HardLabel::Class(label) => Some(*label),
            HardLabel::NoEvidence => None,
        }
    }

    pub fn is_class(&self, label: Label) -> bool {
        *self == HardLabel::Class(label)
    }
}

impl fmt::Display for HardLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardLabel::Class(label) => write!(f, "{label}"),
            HardLabel::NoEvidence => f.write_str(NO_EVIDENCE_TAG),
        }
    }
}

// Classes serialize as integers, no-evidence as a tag string. Both forms
// also work as JSON object keys, which the cluster map relies on.
impl Serialize for HardLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HardLabel::Class(label) => serializer.serialize_i64(*label),
            HardLabel::NoEvidence => serializer.serialize_str(NO_EVIDENCE_TAG),
        }
    }
}

impl<'de> Deserialize<'de> for HardLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HardLabelVisitor;

        impl Visitor<'_> for HardLabelVisitor {
            type Value = HardLabel;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "an integer class or \"{NO_EVIDENCE_TAG}\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<HardLabel, E> {
                Ok(HardLabel::Class(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<HardLabel, E> {
                i64::try_from(v)
                    .map(HardLabel::Class)
                    .map_err(|_| E::custom(format!("class {v} out of range")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<HardLabel, E> {
                if v == NO_EVIDENCE_TAG {
                    return Ok(HardLabel::NoEvidence);
                }
                v.parse::<i64>()
                    .map(HardLabel::Class)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(HardLabelVisitor)
    }
}

/// Soft conditions raised during a detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionWarning {
    /// Iteration cap reached before the tolerance was met
    NonConverged { iterations: usize, final_delta: f64 },
    /// No account carried a known label
    NoKnownLabels,
    /// Self-loop records were dropped from the edge set
    SelfLoopsSkipped { count: usize },
}

/// Edge in a [`GraphSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: AccountId,
    pub target: AccountId,
    /// Amount of the last record seen for this pair
    pub amount: f64,
}

/// Node and edge sets of the account graph, for visualization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<AccountId>,
    pub edges: Vec<SnapshotEdge>,
}

/// How the label-spreading run went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationSummary {
    /// Distinct known classes, in column order
    pub classes: Vec<Label>,
    /// Accounts that carried a known label
    pub known_labels: usize,
    pub iterations: usize,
    pub converged: bool,
    /// L1 change of the last update
    pub final_delta: f64,
}

/// Egress message: the outcome of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// Unique report identifier
    pub report_id: String,

    /// Batch this report answers
    pub batch_id: String,

    /// Class value treated as risk
    pub risk_label: Label,

    /// Risk cluster flattened in node order
    pub risk_accounts: Vec<AccountId>,

    /// Clusters restricted to the risk label
    pub risk_clusters: ClusterMap,

    /// Full partition of accounts by final label
    pub clusters: ClusterMap,

    /// Account graph the clusters were computed on
    pub graph: GraphSnapshot,

    pub propagation: PropagationSummary,

    pub warnings: Vec<DetectionWarning>,

    /// Report generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl RiskReport {
    pub fn has_risk(&self) -> bool {
        !self.risk_accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_no_evidence_sorts_after_classes() {
        let mut labels = vec![HardLabel::NoEvidence, HardLabel::Class(1), HardLabel::Class(0)];
        labels.sort();

        assert_eq!(
            labels,
            vec![HardLabel::Class(0), HardLabel::Class(1), HardLabel::NoEvidence]
        );
        assert_eq!(HardLabel::NoEvidence.class(), None);
        assert!(!HardLabel::NoEvidence.is_class(0));
    }

    #[test]
    fn test_hard_label_as_map_key() {
        let mut map = BTreeMap::new();
        map.insert(HardLabel::Class(1), vec![10, 20]);
        map.insert(HardLabel::NoEvidence, vec![99]);

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"1":[10,20],"no_evidence":[99]}"#);

        let back: BTreeMap<HardLabel, Vec<AccountId>> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_warning_serialization() {
        let warning = DetectionWarning::SelfLoopsSkipped { count: 2 };
        let json = serde_json::to_value(&warning).unwrap();

        assert_eq!(json["kind"], "self_loops_skipped");
        assert_eq!(json["count"], 2);
    }
}
