//! Account graph construction from transaction records

use crate::error::{DetectionError, Result};
use crate::types::report::{GraphSnapshot, SnapshotEdge};
use crate::types::transaction::{AccountId, TransactionRecord};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What to do with a record whose `from_acct` equals its `to_acct`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfLoopPolicy {
    /// Keep the account as a node, drop the edge, log it
    #[default]
    Skip,
    /// Fail the whole batch
    Reject,
}

/// Graph construction settings
#[derive(Debug, Clone)]
pub struct GraphOptions {
    pub self_loop_policy: SelfLoopPolicy,
    /// Upper bound on accounts; propagation is O(|V|^2) in memory and time
    pub max_nodes: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            self_loop_policy: SelfLoopPolicy::Skip,
            max_nodes: 5000,
        }
    }
}

/// Canonical account ordering shared by the label vector, the affinity
/// matrix and the cluster map.
///
/// Position `i` is the `i`-th account in order of first appearance
/// (`from_acct` before `to_acct`, records in input order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeOrder {
    accounts: Vec<AccountId>,
    positions: HashMap<AccountId, usize>,
}

impl NodeOrder {
    fn push(&mut self, account: AccountId) -> usize {
        let position = self.accounts.len();
        self.accounts.push(account);
        self.positions.insert(account, position);
        position
    }

    pub fn position(&self, account: AccountId) -> Option<usize> {
        self.positions.get(&account).copied()
    }

    pub fn account(&self, position: usize) -> Option<AccountId> {
        self.accounts.get(position).copied()
    }

    pub fn accounts(&self) -> &[AccountId] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.accounts.iter().copied()
    }
}

/// Undirected graph over accounts.
///
/// Nodes are never removed, so a node's `NodeIndex` equals its position
/// in the [`NodeOrder`].
#[derive(Debug, Clone)]
pub struct AccountGraph {
    graph: UnGraph<AccountId, f64>,
    order: NodeOrder,
    skipped_self_loops: usize,
}

impl AccountGraph {
    /// Build the graph from records in order.
    ///
    /// Repeated pairs collapse into one edge whose amount is the last one
    /// seen. Amounts never influence propagation.
    pub fn build(records: &[TransactionRecord], options: &GraphOptions) -> Result<Self> {
        let mut builder = Self {
            graph: UnGraph::new_undirected(),
            order: NodeOrder::default(),
            skipped_self_loops: 0,
        };

        for (index, record) in records.iter().enumerate() {
            let from = builder.node_for(record.from_acct);

            if record.is_self_loop() {
                match options.self_loop_policy {
                    SelfLoopPolicy::Reject => {
                        return Err(DetectionError::SelfLoop {
                            index,
                            account: record.from_acct,
                        });
                    }
                    SelfLoopPolicy::Skip => {
                        warn!(
                            index = index,
                            account = record.from_acct,
                            "Skipping self-loop record"
                        );
                        builder.skipped_self_loops += 1;
                        continue;
                    }
                }
            }

            let to = builder.node_for(record.to_acct);
            builder.graph.update_edge(from, to, record.amount);
        }

        if builder.order.len() > options.max_nodes {
            return Err(DetectionError::GraphTooLarge {
                nodes: builder.order.len(),
                limit: options.max_nodes,
            });
        }

        debug!(
            nodes = builder.node_count(),
            edges = builder.edge_count(),
            components = builder.component_count(),
            skipped_self_loops = builder.skipped_self_loops,
            "Account graph built"
        );

        Ok(builder)
    }

    fn node_for(&mut self, account: AccountId) -> NodeIndex {
        match self.order.position(account) {
            Some(position) => NodeIndex::new(position),
            None => {
                let index = self.graph.add_node(account);
                let position = self.order.push(account);
                debug_assert_eq!(index.index(), position);
                index
            }
        }
    }

    pub fn node_order(&self) -> &NodeOrder {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn skipped_self_loops(&self) -> usize {
        self.skipped_self_loops
    }

    pub fn component_count(&self) -> usize {
        connected_components(&self.graph)
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.order.position(account).is_some()
    }

    pub fn has_edge(&self, a: AccountId, b: AccountId) -> bool {
        match (self.order.position(a), self.order.position(b)) {
            (Some(a), Some(b)) => self
                .graph
                .find_edge(NodeIndex::new(a), NodeIndex::new(b))
                .is_some(),
            _ => false,
        }
    }

    /// Retained amount on the edge between `a` and `b`
    pub fn edge_amount(&self, a: AccountId, b: AccountId) -> Option<f64> {
        let a = NodeIndex::new(self.order.position(a)?);
        let b = NodeIndex::new(self.order.position(b)?);
        self.graph.find_edge(a, b).map(|edge| self.graph[edge])
    }

    /// Neighbours of `account`, unordered
    pub fn neighbors(&self, account: AccountId) -> Vec<AccountId> {
        self.order
            .position(account)
            .map(|position| {
                self.graph
                    .neighbors(NodeIndex::new(position))
                    .map(|n| self.graph[n])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edges as `(position, position)` pairs in the canonical order
    pub fn edge_positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index()))
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.order.accounts().to_vec(),
            edges: self
                .graph
                .edge_references()
                .map(|edge| SnapshotEdge {
                    source: self.graph[edge.source()],
                    target: self.graph[edge.target()],
                    amount: *edge.weight(),
                })
                .collect(),
        }
    }
}
