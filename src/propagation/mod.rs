//! Label spreading and the clustering of its result

pub mod clusters;
pub mod spreading;

pub use clusters::ClusterMap;
pub use spreading::{LabelSpreading, Propagation, SpreadingParams};
