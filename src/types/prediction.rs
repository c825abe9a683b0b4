//! Prediction results and the records handed to persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from a 0-100 risk score
    pub fn from_score(risk_score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if risk_score >= thresholds.critical {
            RiskLevel::Critical
        } else if risk_score >= thresholds.high {
            RiskLevel::High
        } else if risk_score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Lower bounds of each risk level on the 0-100 risk score scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 50.0,
            high: 70.0,
            critical: 90.0,
        }
    }
}

/// Outcome of scoring a single transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Probability mass assigned to the fraud class (0.0 - 1.0)
    pub fraud_probability: f64,

    /// `fraud_probability > threshold`
    pub is_fraud: bool,

    /// Fraud probability on a 0-100 scale
    pub risk_score: f64,

    /// Contributing factors, most significant first
    pub explanation: Vec<String>,

    /// Version of the model snapshot that produced this result
    pub model_version: String,
}

/// A prediction keyed by its transaction, as published for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTransaction {
    /// Unique record identifier
    pub record_id: String,

    /// Upstream transaction identifier, when one was supplied
    pub transaction_id: Option<String>,

    /// Merchant the transaction was made at
    pub merchant_id: String,

    /// Transaction amount
    pub amount: f64,

    /// Risk level classification
    pub risk_level: RiskLevel,

    #[serde(flatten)]
    pub prediction: PredictionResult,

    /// Scoring timestamp
    pub scored_at: DateTime<Utc>,
}

impl ScoredTransaction {
    pub fn new(
        transaction_id: Option<String>,
        merchant_id: String,
        amount: f64,
        prediction: PredictionResult,
        thresholds: &RiskLevelThresholds,
    ) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            merchant_id,
            amount,
            risk_level: RiskLevel::from_score(prediction.risk_score, thresholds),
            prediction,
            scored_at: Utc::now(),
        }
    }
}
