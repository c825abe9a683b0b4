//! Scoring statistics: dashboard counters, latency and recent alerts.

use crate::error::PredictError;
use crate::types::prediction::ScoredTransaction;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Aggregate counts shown on the fraud dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_transactions: u64,
    pub fraud_count: u64,
    pub legitimate_count: u64,
    pub average_risk_score: f64,
}

/// Metrics collector for scoring throughput and outcomes
pub struct ScoringMetrics {
    /// Successfully scored transactions
    pub transactions_scored: AtomicU64,
    /// Transactions flagged as fraud
    pub fraud_detected: AtomicU64,
    /// Transactions rejected at decoding or feature extraction
    pub rejected: AtomicU64,
    /// Internal scoring failures, including calls before a model was loaded
    pub scoring_failures: AtomicU64,
    risk_score_sum: RwLock<f64>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution buckets (0-10, 10-20, ... 90-100)
    score_buckets: RwLock<[u64; 10]>,
    /// Most recent fraud alerts, newest last
    recent_alerts: RwLock<VecDeque<ScoredTransaction>>,
    recent_alerts_capacity: usize,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    /// Create a new metrics collector keeping up to `recent_alerts` alerts
    pub fn new(recent_alerts: usize) -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            fraud_detected: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            scoring_failures: AtomicU64::new(0),
            risk_score_sum: RwLock::new(0.0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            recent_alerts: RwLock::new(VecDeque::with_capacity(recent_alerts)),
            recent_alerts_capacity: recent_alerts,
            start_time: Instant::now(),
        }
    }

    /// Record a scored transaction
    pub fn record_scored(&self, processing_time: Duration, scored: &ScoredTransaction) {
        let prediction = &scored.prediction;
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);

        {
            let mut times = self
                .processing_times
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        *self
            .risk_score_sum
            .write()
            .unwrap_or_else(PoisonError::into_inner) += prediction.risk_score;

        let bucket = (prediction.risk_score / 10.0).clamp(0.0, 9.0) as usize;
        self.score_buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)[bucket] += 1;

        if prediction.is_fraud {
            self.fraud_detected.fetch_add(1, Ordering::Relaxed);
            if self.recent_alerts_capacity > 0 {
                let mut alerts = self
                    .recent_alerts
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                if alerts.len() == self.recent_alerts_capacity {
                    alerts.pop_front();
                }
                alerts.push_back(scored.clone());
            }
        }
    }

    /// Record a message that could not be decoded into a transaction
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed prediction
    pub fn record_failure(&self, error: &PredictError) {
        match error {
            PredictError::FeatureExtraction(_) => self.record_rejected(),
            PredictError::NotReady(_) | PredictError::Scoring(_) => {
                self.scoring_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Counters for the dashboard
    pub fn dashboard_stats(&self) -> DashboardStats {
        let total = self.transactions_scored.load(Ordering::Relaxed);
        let fraud = self.fraud_detected.load(Ordering::Relaxed);
        let sum = *self
            .risk_score_sum
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        DashboardStats {
            total_transactions: total,
            fraud_count: fraud,
            legitimate_count: total.saturating_sub(fraud),
            average_risk_score: if total > 0 { sum / total as f64 } else { 0.0 },
        }
    }

    /// Most recent fraud alerts, newest first
    pub fn recent_alerts(&self) -> Vec<ScoredTransaction> {
        self.recent_alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = self
            .processing_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
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

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self
            .score_buckets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let stats = self.dashboard_stats();
        let fraud_rate = if stats.total_transactions > 0 {
            (stats.fraud_count as f64 / stats.total_transactions as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD SCORING - METRICS SUMMARY                 ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored:    {:>8}  │  Throughput: {:>6.1} tx/s ║",
            stats.total_transactions, throughput
        );
        info!(
            "║ Flagged as Fraud:       {:>8}  │  Fraud Rate: {:>6.1}%     ║",
            stats.fraud_count, fraud_rate
        );
        info!(
            "║ Rejected: {:>8}  Failed: {:>8}  Avg Risk: {:>6.1}        ║",
            self.rejected.load(Ordering::Relaxed),
            self.scoring_failures.load(Ordering::Relaxed),
            stats.average_risk_score
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar_len = (pct / 2.0) as usize;
            let bar: String = "█".repeat(bar_len.min(20));
            info!(
                "║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new(50)
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
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FeatureExtractionError, NotReadyError};
    use crate::types::prediction::{PredictionResult, RiskLevelThresholds};

    fn scored(id: &str, probability: f64) -> ScoredTransaction {
        ScoredTransaction::new(
            Some(id.to_string()),
            "M1".to_string(),
            100.0,
            PredictionResult {
                fraud_probability: probability,
                is_fraud: probability > 0.5,
                risk_score: probability * 100.0,
                explanation: Vec::new(),
                model_version: "test".to_string(),
            },
            &RiskLevelThresholds::default(),
        )
    }

    #[test]
    fn test_dashboard_stats() {
        let metrics = ScoringMetrics::new(10);

        metrics.record_scored(Duration::from_micros(100), &scored("a", 0.2));
        metrics.record_scored(Duration::from_micros(200), &scored("b", 0.8));
        metrics.record_scored(Duration::from_micros(300), &scored("c", 1.0));
        metrics.record_failure(&PredictError::FeatureExtraction(
            FeatureExtractionError::MissingAmount,
        ));
        metrics.record_failure(&PredictError::NotReady(NotReadyError));

        let stats = metrics.dashboard_stats();
        assert_eq!(stats.total_transactions, 3);
        assert_eq!(stats.fraud_count, 2);
        assert_eq!(stats.legitimate_count, 1);
        assert!((stats.average_risk_score - 66.666).abs() < 0.01);
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.scoring_failures.load(Ordering::Relaxed), 1);

        let buckets = metrics.get_score_distribution();
        assert_eq!(buckets[2], 1);
        assert_eq!(buckets[8], 1);
        assert_eq!(buckets[9], 1);
    }

    #[test]
    fn test_undecodable_messages_count_as_rejected() {
        let metrics = ScoringMetrics::new(10);

        metrics.record_rejected();
        metrics.record_failure(&PredictError::FeatureExtraction(
            FeatureExtractionError::InvalidAmount(-1.0),
        ));

        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.scoring_failures.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.dashboard_stats().total_transactions, 0);
    }

    #[test]
    fn test_recent_alerts_are_bounded() {
        let metrics = ScoringMetrics::new(2);

        for (i, p) in [0.9, 0.1, 0.95, 0.99].iter().enumerate() {
            metrics.record_scored(Duration::from_micros(10), &scored(&format!("tx{}", i), *p));
        }

        let alerts = metrics.recent_alerts();
        let ids: Vec<_> = alerts
            .iter()
            .map(|a| a.transaction_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["tx3".to_string(), "tx2".to_string()]);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = ScoringMetrics::default();
        assert_eq!(metrics.dashboard_stats().average_risk_score, 0.0);
        assert_eq!(metrics.get_processing_stats().count, 0);
    }
}
