//! Fraud Scoring Library
//!
//! Real-time credit card fraud scoring: feature extraction, a hot-swappable
//! classifier snapshot, thresholding and per-feature explanations.

pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use error::{FeatureExtractionError, ModelLoadError, NotReadyError, PredictError, ScoringError};
pub use feature_extractor::FeatureExtractor;
pub use models::inference::ScoringEngine;
pub use producer::ResultProducer;
pub use types::{prediction::PredictionResult, prediction::ScoredTransaction, transaction::Transaction};
