//! NATS ingress for transaction batches

use crate::types::TransactionBatch;
use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the batch subject, optionally as part of a queue group so
/// several service instances split the stream instead of each seeing it.
pub struct BatchConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl BatchConsumer {
    pub fn new(client: Client, subject: &str, queue_group: Option<&str>) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.map(str::to_string),
        }
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(self.subject.clone(), group.clone())
                    .await?
            }
            None => self.client.subscribe(self.subject.clone()).await?,
        };
        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to batch subject"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Parse a batch payload, assigning a batch id when the producer sent none.
pub fn decode_batch(payload: &[u8]) -> Result<TransactionBatch> {
    let mut batch: TransactionBatch =
        serde_json::from_slice(payload).context("Failed to deserialize transaction batch")?;
    if batch.batch_id.as_deref().map_or(true, str::is_empty) {
        batch.batch_id = Some(uuid::Uuid::new_v4().to_string());
    }
    Ok(batch)
}
