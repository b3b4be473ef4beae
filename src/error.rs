//! Error types for the detection core

use crate::types::AccountId;

/// Errors raised while validating input or configuring propagation.
///
/// Soft conditions (non-convergence, no known labels, skipped self-loops)
/// are not errors; they are reported on the detection outcome instead.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("self-loop on account {account} at record {index}")]
    SelfLoop { index: usize, account: AccountId },

    #[error("graph has {nodes} accounts, limit is {limit}")]
    GraphTooLarge { nodes: usize, limit: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, DetectionError>;
