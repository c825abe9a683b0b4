//! Type definitions for the fraud scoring service

pub mod prediction;
pub mod transaction;

pub use prediction::{PredictionResult, RiskLevel, RiskLevelThresholds, ScoredTransaction};
pub use transaction::{AttributeValue, CardNumber, Transaction};
