//! Fraud Ring Detection Library
//!
//! Flags coordinated fraud rings among accounts: a batch of transactions
//! becomes an undirected account graph, confirmed fraud and clean labels
//! are spread over it with label spreading, and accounts that end up in
//! the fraud class form the reported risk cluster.

pub mod config;
pub mod consumer;
pub mod detector;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod producer;
pub mod propagation;
pub mod types;

pub use config::AppConfig;
pub use consumer::BatchConsumer;
pub use detector::{Detection, RingDetector};
pub use error::{DetectionError, Result};
pub use producer::ReportProducer;
pub use types::{HardLabel, RiskReport, TransactionBatch, TransactionRecord};
