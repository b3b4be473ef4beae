//! Fraud Ring Detection - Main Entry Point
//!
//! Consumes transaction batches from NATS, spreads known fraud labels over
//! each batch's account graph, and publishes the risk clusters found.

use anyhow::{Context, Result};
use fraud_ring_detection::{
    config::{AppConfig, LoggingConfig},
    consumer::{decode_batch, BatchConsumer},
    detector::RingDetector,
    metrics::{MetricsReporter, PipelineMetrics},
    producer::ReportProducer,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("fraud_ring_detection={}", logging.level)))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
    Ok(())
}

/// Run CPU-bound work on the blocking pool under a deadline.
///
/// The permit moves into the blocking closure: a timed-out job is abandoned,
/// not cancelled, and keeps its worker slot until it actually returns.
async fn run_bounded<T, F>(
    permit: OwnedSemaphorePermit,
    timeout: Duration,
    work: F,
) -> std::result::Result<std::result::Result<T, JoinError>, tokio::time::error::Elapsed>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let job = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        work()
    });
    tokio::time::timeout(timeout, job).await
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Fraud Ring Detection");
    info!(
        "Label spreading: alpha={:.2}, max_iter={}, tol={:e}, risk_label={}, max_nodes={}",
        config.detection.alpha,
        config.detection.max_iter,
        config.detection.tol,
        config.detection.risk_label,
        config.detection.max_nodes
    );

    let detector = Arc::new(RingDetector::new(config.detection.clone())?);
    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = BatchConsumer::new(
        client.clone(),
        &config.nats.batch_subject,
        config.nats.queue_group.as_deref(),
    );
    let producer = Arc::new(ReportProducer::new(client.clone(), &config.nats.report_subject));

    let num_workers = config.pipeline.workers;
    let timeout = Duration::from_millis(config.pipeline.timeout_ms);
    info!(
        "Starting batch processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", consumer.subject());
    info!("Publishing reports to: {}", producer.subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    // Start metrics reporter (prints summary every 60 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 60);
        reporter.start().await;
    });

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let detector = detector.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let batch = match decode_batch(&message.payload) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = format!("{e:#}"), "Dropping undecodable batch");
                    metrics.record_failure();
                    return;
                }
            };
            let batch_id = batch.batch_id.clone().unwrap_or_default();

            debug!(batch_id = %batch_id, records = batch.records.len(), "Batch received");

            let job = run_bounded(permit, timeout, move || detector.detect_raw(&batch.records));

            let detection = match job.await {
                Ok(Ok(Ok(detection))) => detection,
                Ok(Ok(Err(e))) => {
                    warn!(batch_id = %batch_id, error = %e, "Batch rejected");
                    metrics.record_failure();
                    return;
                }
                Ok(Err(e)) => {
                    error!(batch_id = %batch_id, error = %e, "Detection task failed");
                    metrics.record_failure();
                    return;
                }
                Err(_) => {
                    error!(
                        batch_id = %batch_id,
                        timeout_ms = timeout.as_millis(),
                        "Detection exceeded deadline; result abandoned, worker slot held until it finishes"
                    );
                    metrics.record_failure();
                    return;
                }
            };

            let processing_time = start_time.elapsed();
            metrics.record_detection(processing_time, &detection);

            let report = detection.to_report(&batch_id);
            for warning in &report.warnings {
                warn!(batch_id = %batch_id, warning = ?warning, "Detection warning");
            }

            match producer.publish(&report).await {
                Ok(()) => {
                    metrics.record_published();
                    info!(
                        batch_id = %batch_id,
                        report_id = %report.report_id,
                        risk_accounts = report.risk_accounts.len(),
                        processing_time_us = processing_time.as_micros(),
                        "Risk report published"
                    );
                }
                Err(e) => {
                    metrics.record_publish_failure();
                    error!(batch_id = %batch_id, error = %e, "Failed to publish risk report");
                }
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.2} batch/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_out_job_keeps_its_permit() {
        let semaphore = Arc::new(Semaphore::new(1));
        let permit = semaphore.clone().acquire_owned().await.unwrap();
        let (release, wait) = std::sync::mpsc::channel::<()>();

        let outcome = run_bounded(permit, Duration::from_millis(20), move || {
            let _ = wait.recv();
        })
        .await;

        assert!(outcome.is_err());
        assert_eq!(semaphore.available_permits(), 0);

        release.send(()).unwrap();
        let permit = tokio::time::timeout(Duration::from_secs(5), semaphore.acquire_owned())
            .await
            .unwrap();
        assert!(permit.is_ok());
    }

    #[tokio::test]
    async fn test_finished_job_releases_permit() {
        let semaphore = Arc::new(Semaphore::new(1));
        let permit = semaphore.clone().acquire_owned().await.unwrap();

        let outcome = run_bounded(permit, Duration::from_secs(5), || 7).await;

        assert_eq!(outcome.unwrap().unwrap(), 7);
        assert_eq!(semaphore.available_permits(), 1);
    }
}
