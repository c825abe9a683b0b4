//! NATS message producer for scored transactions

use crate::types::prediction::ScoredTransaction;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Publishes scored transactions for the persistence layer
#[derive(Clone)]
pub struct ResultProducer {
    client: Client,
    subject: String,
}

impl ResultProducer {
    /// Create a new result producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a scored transaction
    pub async fn publish(&self, scored: &ScoredTransaction) -> Result<()> {
        let payload = serde_json::to_vec(scored)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            record_id = %scored.record_id,
            transaction_id = ?scored.transaction_id,
            risk_score = scored.prediction.risk_score,
            "Published scored transaction"
        );

        Ok(())
    }
}
