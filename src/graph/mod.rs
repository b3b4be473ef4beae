//! Graph-side inputs to propagation: the account graph, its known labels,
//! and the affinity matrix, all sharing one [`NodeOrder`]

pub mod affinity;
pub mod builder;
pub mod labels;

pub use affinity::AffinityMatrix;
pub use builder::{AccountGraph, GraphOptions, NodeOrder, SelfLoopPolicy};
pub use labels::{LabelAnchor, LabelVector};
