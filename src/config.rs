//! Configuration management for the fraud ring detection service

use crate::graph::{GraphOptions, LabelAnchor, SelfLoopPolicy};
use crate::propagation::SpreadingParams;
use crate::types::transaction::Label;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Label value of confirmed fraud
pub const RISK_LABEL: Label = 1;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transaction batches
    pub batch_subject: String,
    /// Subject for outgoing risk reports
    pub report_subject: String,
    /// Queue group shared by service instances; unset means every instance sees every batch
    #[serde(default)]
    pub queue_group: Option<String>,
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Class value whose cluster is reported as risky
    #[serde(default = "default_risk_label")]
    pub risk_label: Label,
    /// Label spreading clamping factor
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Maximum label spreading iterations
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Convergence tolerance
    #[serde(default = "default_tol")]
    pub tol: f64,
    /// Which account a record's label describes
    #[serde(default)]
    pub label_anchor: LabelAnchor,
    /// Handling of from_acct == to_acct records
    #[serde(default)]
    pub self_loop_policy: SelfLoopPolicy,
    /// Largest graph accepted per batch
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
}

fn default_risk_label() -> Label {
    RISK_LABEL
}

fn default_alpha() -> f64 {
    0.2
}

fn default_max_iter() -> usize {
    30
}

fn default_tol() -> f64 {
    1e-3
}

fn default_max_nodes() -> usize {
    5000
}

impl DetectionConfig {
    pub fn spreading_params(&self) -> SpreadingParams {
        SpreadingParams {
            alpha: self.alpha,
            max_iter: self.max_iter,
            tol: self.tol,
        }
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            self_loop_policy: self.self_loop_policy,
            max_nodes: self.max_nodes,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            risk_label: RISK_LABEL,
            alpha: default_alpha(),
            max_iter: default_max_iter(),
            tol: default_tol(),
            label_anchor: LabelAnchor::Source,
            self_loop_policy: SelfLoopPolicy::Skip,
            max_nodes: default_max_nodes(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of batches processed concurrently
    pub workers: usize,
    /// Deadline for one batch in milliseconds
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .detection
            .spreading_params()
            .validate()
            .context("Invalid detection configuration")?;

        Ok(app_config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                batch_subject: "transactions.batch".to_string(),
                report_subject: "fraud.rings".to_string(),
                queue_group: None,
            },
            detection: DetectionConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                timeout_ms: 10_000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.detection.risk_label, 1);
        assert_eq!(config.detection.alpha, 0.2);
        assert_eq!(config.detection.max_iter, 30);
        assert_eq!(config.detection.label_anchor, LabelAnchor::Source);
        assert_eq!(config.detection.self_loop_policy, SelfLoopPolicy::Skip);
    }

    #[test]
    fn test_spreading_params_from_config() {
        let params = DetectionConfig::default().spreading_params();
        assert_eq!(params, SpreadingParams::default());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_load_shipped_config() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/config.toml");
        let config = AppConfig::load_from_path(path).unwrap();

        assert_eq!(config.nats.batch_subject, "transactions.batch");
        assert_eq!(config.nats.queue_group.as_deref(), Some("ring-detectors"));
        assert_eq!(config.detection.tol, 1e-3);
        assert_eq!(config.detection.max_nodes, 5000);
        assert_eq!(config.pipeline.workers, 4);
    }

    #[test]
    fn test_detection_section_defaults() {
        let detection: DetectionConfig =
            serde_json::from_str(r#"{"label_anchor": "record_id", "self_loop_policy": "reject"}"#)
                .unwrap();

        assert_eq!(detection.label_anchor, LabelAnchor::RecordId);
        assert_eq!(detection.self_loop_policy, SelfLoopPolicy::Reject);
        assert_eq!(detection.alpha, 0.2);
        assert_eq!(detection.risk_label, RISK_LABEL);
    }
}
