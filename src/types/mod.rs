//! Type definitions for the fraud ring detection pipeline

pub mod report;
pub mod transaction;

pub use report::{DetectionWarning, GraphSnapshot, HardLabel, PropagationSummary, RiskReport};
pub use transaction::{
    AccountId, Label, RawRecord, TransactionBatch, TransactionRecord, UNKNOWN_LABEL,
};
