//! NATS message producer for risk reports

use crate::types::report::RiskReport;
use anyhow::{Context, Result};
use async_nats::Client;
use tracing::debug;

/// Producer for publishing risk reports to NATS
#[derive(Clone)]
pub struct ReportProducer {
    client: Client,
    subject: String,
}

impl ReportProducer {
    /// Create a new report producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a risk report
    pub async fn publish(&self, report: &RiskReport) -> Result<()> {
        let payload = serde_json::to_vec(report).context("Failed to serialize risk report")?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            report_id = %report.report_id,
            batch_id = %report.batch_id,
            risk_accounts = report.risk_accounts.len(),
            "Published risk report"
        );

        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
