//! Test Transaction Producer
//!
//! Generates and publishes synthetic card transactions to NATS for exercising
//! the scoring service.

use chrono::{Duration as ChronoDuration, Utc};
use fraud_scoring::types::transaction::{AttributeValue, Transaction};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    fn card_number(&mut self) -> String {
        format!("4{:015}", self.rng.gen_range(0..1_000_000_000_000_000u64))
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> Transaction {
        self.transaction_counter += 1;
        let timestamp = Utc::now() - ChronoDuration::minutes(self.rng.gen_range(0..600));

        let mut tx = Transaction::new(
            (self.rng.gen_range(5.0..300.0_f64) * 100.0).round() / 100.0,
            timestamp.to_rfc3339(),
            format!("merchant_{}", self.rng.gen_range(1..1000)),
            self.card_number(),
            self.random_choice(&["in_store", "in_store", "online", "atm"]),
        )
        .with_id(format!("tx_{:012}", self.transaction_counter))
        .with_attribute(
            "device",
            AttributeValue::Text(self.random_choice(&["pos", "mobile", "desktop"]).to_string()),
        );

        if self.rng.gen_bool(0.8) {
            tx = tx.with_location(self.random_choice(&["New York", "London", "Toronto", "Berlin"]));
        }
        tx
    }

    /// Generate a suspicious transaction
    fn generate_suspicious(&mut self) -> Transaction {
        self.transaction_counter += 1;
        // Night time, card not present, large amount
        let timestamp = Utc::now()
            .date_naive()
            .and_hms_opt(self.rng.gen_range(0..5), self.rng.gen_range(0..60), 0)
            .map(|naive| naive.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        Transaction::new(
            (self.rng.gen_range(1000.0..10000.0_f64) * 100.0).round() / 100.0,
            timestamp,
            format!("merchant_{}", self.rng.gen_range(1..50)),
            self.card_number(),
            self.random_choice(&["online", "transfer"]),
        )
        .with_id(format!("tx_{:012}", self.transaction_counter))
        .with_attribute("failed_attempts", AttributeValue::Number(self.rng.gen_range(1..5) as f64))
        .with_attribute("vpn", AttributeValue::Bool(true))
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

/// Command line options, positional: url, subject, count, fraud rate, delay
struct Options {
    nats_url: String,
    subject: String,
    count: u64,
    suspicious_rate: f64,
    delay: Duration,
}

impl Options {
    fn from_args() -> Self {
        let mut args = std::env::args().skip(1);
        let mut next = || args.next();
        Self {
            nats_url: next().unwrap_or_else(|| "nats://localhost:4222".to_string()),
            subject: next().unwrap_or_else(|| "transactions".to_string()),
            count: next().and_then(|s| s.parse().ok()).unwrap_or(100),
            suspicious_rate: next()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.1_f64)
                .clamp(0.0, 1.0),
            delay: Duration::from_millis(next().and_then(|s| s.parse().ok()).unwrap_or(100)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    let options = Options::from_args();
    info!(
        nats_url = %options.nats_url,
        subject = %options.subject,
        count = options.count,
        suspicious_rate = options.suspicious_rate,
        delay_ms = options.delay.as_millis() as u64,
        "Starting test transaction producer"
    );

    // Without a server the generated transactions are only logged
    let client = match async_nats::connect(options.nats_url.as_str()).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, "NATS unavailable, running in dry-run mode");
            None
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let (mut legitimate, mut suspicious) = (0u64, 0u64);

    for i in 1..=options.count {
        let transaction = if rng.gen_bool(options.suspicious_rate) {
            suspicious += 1;
            generator.generate_suspicious()
        } else {
            legitimate += 1;
            generator.generate_legitimate()
        };

        match &client {
            Some(client) => {
                let payload = serde_json::to_vec(&transaction)?;
                client.publish(options.subject.clone(), payload.into()).await?;
            }
            None if i == 1 || i % 10 == 0 => {
                info!("Sample transaction {}:\n{}", i, serde_json::to_string_pretty(&transaction)?);
            }
            None => {}
        }

        if i % 10 == 0 {
            info!(sent = i, total = options.count, legitimate, suspicious, "Progress");
        }
        tokio::time::sleep(options.delay).await;
    }

    if let Some(client) = client {
        client.flush().await?;
    }
    info!(legitimate, suspicious, "Done");
    Ok(())
}
