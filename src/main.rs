//! Fraud Scoring Service - Main Entry Point
//!
//! Consumes transactions from NATS, scores them with the loaded model and
//! publishes the results for storage. A message on the reload subject swaps in
//! a new model artifact without stopping the service.

use anyhow::{Context, Result};
use fraud_scoring::{
    config::{AppConfig, LoggingConfig},
    consumer::{decode_transaction, reload_target, TransactionConsumer},
    metrics::{MetricsReporter, ScoringMetrics},
    producer::ResultProducer,
    ScoredTransaction, ScoringEngine,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!("fraud_scoring={}", logging.level))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::args().nth(1).unwrap_or_else(|| "config/config.toml".to_string());
    let config = AppConfig::load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_logging(&config.logging)?;
    info!("Starting Fraud Scoring Service");
    info!(
        threshold = config.engine.threshold,
        significance_threshold = config.engine.significance_threshold,
        max_explanations = config.engine.max_explanations,
        "Configuration loaded"
    );

    let metrics = Arc::new(ScoringMetrics::new(config.metrics.recent_alerts));

    let engine = Arc::new(ScoringEngine::from_config(&config)?);
    info!(
        "Scoring engine initialized ({} features)",
        engine.feature_names().len()
    );

    let artifact_path = config.models.artifact_path.clone();
    let model_info = {
        let engine = engine.clone();
        let path = artifact_path.clone();
        tokio::task::spawn_blocking(move || engine.load(path)).await??
    };
    info!(version = %model_info.version, "Model ready");

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = TransactionConsumer::new(
        client.clone(),
        &config.nats.transaction_subject,
        &config.nats.reload_subject,
    );
    let producer = Arc::new(ResultProducer::new(client.clone(), &config.nats.result_subject));

    // Model reloads
    let mut reloads = consumer.subscribe_reload().await?;
    let reload_engine = engine.clone();
    tokio::spawn(async move {
        while let Some(message) = reloads.next().await {
            let path = reload_target(&message.payload, &artifact_path);
            info!(path = %path.display(), "Model reload requested");

            let engine = reload_engine.clone();
            match tokio::task::spawn_blocking(move || engine.load(path)).await {
                Ok(Ok(info)) => info!(version = %info.version, "Model reloaded"),
                Ok(Err(e)) => error!(error = %e, "Model reload failed, previous model still serving"),
                Err(e) => error!(error = %e, "Model reload task failed"),
            }
        }
    });

    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting transaction scoring loop with {} parallel workers",
        num_workers
    );
    info!("Publishing results to: {}", config.nats.result_subject);

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));
    let config = Arc::new(config);

    let metrics_clone = metrics.clone();
    let report_interval = config.metrics.report_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, report_interval);
        reporter.start().await;
    });

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let engine = engine.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let config = config.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let transaction = match decode_transaction(&message.payload) {
                Ok(tx) => tx,
                Err(e) => {
                    metrics.record_rejected();
                    warn!(error = %e, "Failed to deserialize transaction");
                    return;
                }
            };

            match engine.predict(&transaction) {
                Ok(prediction) => {
                    let processing_time = start_time.elapsed();
                    let scored = ScoredTransaction::new(
                        transaction.transaction_id.clone(),
                        transaction.merchant_id.clone(),
                        transaction.amount.unwrap_or_default(),
                        prediction,
                        &config.risk_levels,
                    );
                    metrics.record_scored(processing_time, &scored);

                    if let Err(e) = producer.publish(&scored).await {
                        error!(
                            transaction_id = ?scored.transaction_id,
                            error = %e,
                            "Failed to publish scored transaction"
                        );
                    } else if scored.prediction.is_fraud {
                        info!(
                            transaction_id = ?scored.transaction_id,
                            risk_score = scored.prediction.risk_score,
                            risk_level = scored.risk_level.as_str(),
                            processing_time_us = processing_time.as_micros(),
                            "Fraud detected"
                        );
                    } else {
                        debug!(
                            transaction_id = ?scored.transaction_id,
                            risk_score = scored.prediction.risk_score,
                            processing_time_us = processing_time.as_micros(),
                            "Transaction scored (legitimate)"
                        );
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 100 == 0 {
                        let processing_stats = metrics.get_processing_stats();
                        info!(
                            processed = count,
                            throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                            avg_latency_us = processing_stats.mean_us,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    metrics.record_failure(&e);
                    warn!(
                        transaction_id = ?transaction.transaction_id,
                        error = %e,
                        "Transaction not scored"
                    );
                }
            }

            drop(permit);
        });
    }

    info!("Scoring service shutting down...");
    metrics.print_summary();

    Ok(())
}
