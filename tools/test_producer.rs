//! Test Batch Producer
//!
//! Generates transaction batches with planted fraud rings and publishes them
//! to NATS for end-to-end testing of the ring detection service.

use fraud_ring_detection::types::{AccountId, TransactionBatch, TransactionRecord};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Batch generator for testing
struct BatchGenerator {
    rng: rand::rngs::ThreadRng,
    next_account: AccountId,
}

impl BatchGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            next_account: 100_000,
        }
    }

    fn fresh_accounts(&mut self, count: usize) -> Vec<AccountId> {
        let start = self.next_account;
        self.next_account += count as AccountId;
        (start..self.next_account).collect()
    }

    /// Ordinary customers trading at random, a few confirmed clean
    fn generate_background(&mut self, accounts: usize, records: &mut Vec<TransactionRecord>) {
        let pool = self.fresh_accounts(accounts);
        for _ in 0..accounts * 2 {
            let from = pool[self.rng.gen_range(0..pool.len())];
            let to = pool[self.rng.gen_range(0..pool.len())];
            if from == to {
                continue;
            }
            let label = self.rng.gen_bool(0.2).then_some(0);
            records.push(TransactionRecord::new(
                from,
                from,
                to,
                self.rng.gen_range(10.0..2000.0),
                label,
            ));
        }
    }

    /// A bill-brokering ring: accounts passing notes along a chain with
    /// shortcuts, seeded by one confirmed fraud account
    fn generate_ring(&mut self, size: usize, records: &mut Vec<TransactionRecord>) -> Vec<AccountId> {
        let ring = self.fresh_accounts(size);
        for (i, pair) in ring.windows(2).enumerate() {
            let label = (i == 0).then_some(1);
            records.push(TransactionRecord::new(
                pair[0],
                pair[0],
                pair[1],
                self.rng.gen_range(50_000.0..500_000.0),
                label,
            ));
        }
        for _ in 0..size / 2 {
            let from = ring[self.rng.gen_range(0..ring.len())];
            let to = ring[self.rng.gen_range(0..ring.len())];
            if from != to {
                records.push(TransactionRecord::new(
                    from,
                    from,
                    to,
                    self.rng.gen_range(50_000.0..500_000.0),
                    None,
                ));
            }
        }
        ring
    }

    fn generate_batch(&mut self, rings: usize) -> (TransactionBatch, Vec<AccountId>) {
        let mut records = Vec::new();
        let background = self.rng.gen_range(20..60);
        self.generate_background(background, &mut records);

        let mut planted = Vec::new();
        for _ in 0..rings {
            let size = self.rng.gen_range(3..9);
            planted.extend(self.generate_ring(size, &mut records));
        }

        (TransactionBatch::from_records(&records), planted)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Batch Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions.batch");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let rings: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(2);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        rings = rings,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, rings, delay_ms).await;
        }
    };

    let mut generator = BatchGenerator::new();

    info!("Starting to publish {} batches...", count);

    for i in 0..count {
        let (batch, planted) = generator.generate_batch(rings);
        let payload = serde_json::to_vec(&batch)?;

        client.publish(subject.to_string(), payload.into()).await?;

        info!(
            batch_id = ?batch.batch_id,
            records = batch.records.len(),
            planted_accounts = planted.len(),
            "Published batch {}/{}",
            i + 1,
            count
        );

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    client.flush().await?;
    info!("Completed! Published {} batches", count);

    Ok(())
}

async fn run_dry_mode(count: u64, rings: usize, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = BatchGenerator::new();

    for i in 0..count {
        let (batch, planted) = generator.generate_batch(rings);

        if i == 0 {
            info!("Sample batch:\n{}", serde_json::to_string_pretty(&batch)?);
        }
        info!(
            records = batch.records.len(),
            planted = ?planted,
            "Generated batch {}/{}",
            i + 1,
            count
        );

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
