//! NATS message consumer for incoming transactions and reload requests

use crate::types::transaction::Transaction;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use std::path::PathBuf;
use tracing::info;

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
    reload_subject: String,
}

impl TransactionConsumer {
    /// Create a new transaction consumer
    pub fn new(client: Client, subject: &str, reload_subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            reload_subject: reload_subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    /// Subscribe to administrative model reload requests
    pub async fn subscribe_reload(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.reload_subject.clone()).await?;
        info!(subject = %self.reload_subject, "Subscribed to reload subject");
        Ok(subscriber)
    }
}

/// Decode a transaction message payload
pub fn decode_transaction(payload: &[u8]) -> serde_json::Result<Transaction> {
    serde_json::from_slice(payload)
}

/// Artifact path requested by a reload message; an empty payload means the
/// configured default.
pub fn reload_target(payload: &[u8], default_path: &str) -> PathBuf {
    let requested = String::from_utf8_lossy(payload);
    let requested = requested.trim();
    if requested.is_empty() {
        PathBuf::from(default_path)
    } else {
        PathBuf::from(requested)
    }
}
