//! Performance metrics and statistics tracking for the ring detection service.

use crate::detector::Detection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Upper bounds of the risk-cluster size buckets; the last bucket is open
const CLUSTER_SIZE_BOUNDS: [usize; 5] = [0, 2, 5, 10, 50];

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Batches that produced a report
    pub batches_processed: AtomicU64,
    /// Batches rejected or timed out
    pub batches_failed: AtomicU64,
    /// Reports published
    pub reports_published: AtomicU64,
    /// Reports that could not be published
    pub reports_failed: AtomicU64,
    /// Accounts placed in a risk cluster
    pub accounts_flagged: AtomicU64,
    /// Runs that hit the iteration cap
    pub non_converged: AtomicU64,
    /// Runs without any known label
    pub no_label_batches: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Iterations used per run
    iterations: RwLock<Vec<u64>>,
    /// Risk cluster size distribution
    cluster_size_buckets: RwLock<[u64; 6]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            batches_processed: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            reports_published: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
            accounts_flagged: AtomicU64::new(0),
            non_converged: AtomicU64::new(0),
            no_label_batches: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            iterations: RwLock::new(Vec::with_capacity(1000)),
            cluster_size_buckets: RwLock::new([0; 6]),
            start_time: Instant::now(),
        }
    }

    /// Record a processed batch
    pub fn record_detection(&self, processing_time: Duration, detection: &Detection) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);

        let flagged = detection.risk_accounts().len();
        self.accounts_flagged
            .fetch_add(flagged as u64, Ordering::Relaxed);

        if !detection.propagation.converged {
            self.non_converged.fetch_add(1, Ordering::Relaxed);
        }
        if !detection.graph.is_empty() && !detection.propagation.has_known_labels() {
            self.no_label_batches.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut iterations) = self.iterations.write() {
            iterations.push(detection.propagation.iterations as u64);
            if iterations.len() > 10000 {
                iterations.drain(0..5000);
            }
        }

        let bucket = CLUSTER_SIZE_BOUNDS
            .iter()
            .position(|&bound| flagged <= bound)
            .unwrap_or(CLUSTER_SIZE_BOUNDS.len());
        if let Ok(mut buckets) = self.cluster_size_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a batch that failed validation, detection or its deadline
    pub fn record_failure(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published report
    pub fn record_published(&self) {
        self.reports_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get average iterations per run
    pub fn get_avg_iterations(&self) -> f64 {
        match self.iterations.read() {
            Ok(iterations) if !iterations.is_empty() => {
                iterations.iter().sum::<u64>() as f64 / iterations.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Get current throughput (batches per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.batches_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get risk cluster size distribution
    pub fn get_cluster_size_distribution(&self) -> [u64; 6] {
        self.cluster_size_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processed = self.batches_processed.load(Ordering::Relaxed);
        let failed = self.batches_failed.load(Ordering::Relaxed);
        let published = self.reports_published.load(Ordering::Relaxed);
        let publish_failed = self.reports_failed.load(Ordering::Relaxed);
        let flagged = self.accounts_flagged.load(Ordering::Relaxed);
        let non_converged = self.non_converged.load(Ordering::Relaxed);
        let no_labels = self.no_label_batches.load(Ordering::Relaxed);

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let avg_iterations = self.get_avg_iterations();
        let size_dist = self.get_cluster_size_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          FRAUD RING DETECTION - METRICS SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Batches Processed: {:>8}  │  Throughput: {:>8.2} batch/s  ║",
            processed, throughput
        );
        info!(
            "║ Batches Failed:    {:>8}  │  Reports Published: {:>8}   ║",
            failed, published
        );
        info!(
            "║ Accounts Flagged:  {:>8}  │  Avg Iterations:  {:>8.1}     ║",
            flagged, avg_iterations
        );
        info!(
            "║ Non-converged:     {:>8}  │  Without Labels:  {:>8}       ║",
            non_converged, no_labels
        );
        info!(
            "║ Publish Failures:  {:>8}  │                                 ║",
            publish_failed
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Cluster Size Distribution:                              ║");
        let total: u64 = size_dist.iter().sum();
        for (i, &count) in size_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            let range = match (i.checked_sub(1).map(|p| CLUSTER_SIZE_BOUNDS[p]), CLUSTER_SIZE_BOUNDS.get(i)) {
                (None, Some(upper)) => format!("{upper}"),
                (Some(lower), Some(upper)) => format!("{}-{}", lower + 1, upper),
                (Some(lower), None) => format!("{}+", lower + 1),
                (None, None) => String::new(),
            };
            info!("║   {:>6}: {:>6} ({:>5.1}%) {}", range, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::RingDetector;
    use crate::types::transaction::TransactionRecord;

    fn detection(records: &[TransactionRecord]) -> Detection {
        RingDetector::default().detect(records).unwrap()
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        let ring = detection(&[
            TransactionRecord::new(1, 10, 20, 500.0, Some(1)),
            TransactionRecord::new(2, 20, 30, 700.0, None),
        ]);
        let unlabeled = detection(&[TransactionRecord::new(1, 1, 2, 5.0, None)]);

        metrics.record_detection(Duration::from_micros(100), &ring);
        metrics.record_detection(Duration::from_micros(300), &unlabeled);
        metrics.record_failure();
        metrics.record_published();
        metrics.record_publish_failure();

        assert_eq!(metrics.batches_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.batches_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.reports_published.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.reports_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.accounts_flagged.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.no_label_batches.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_processing_stats().count, 2);
    }

    #[test]
    fn test_cluster_size_buckets() {
        let metrics = PipelineMetrics::new();

        let ring = detection(&[
            TransactionRecord::new(1, 10, 20, 500.0, Some(1)),
            TransactionRecord::new(2, 20, 30, 700.0, None),
        ]);
        let clean = detection(&[TransactionRecord::new(1, 1, 2, 5.0, Some(0))]);

        metrics.record_detection(Duration::from_micros(10), &ring);
        metrics.record_detection(Duration::from_micros(10), &clean);

        // three flagged accounts land in 3-5, zero in the empty bucket
        assert_eq!(metrics.get_cluster_size_distribution(), [1, 0, 1, 0, 0, 0]);
    }
}
