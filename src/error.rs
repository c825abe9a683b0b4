//! Error kinds surfaced by the scoring engine

use std::path::PathBuf;
use thiserror::Error;

/// The engine was asked to score before any model was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("scoring engine has no model loaded")]
pub struct NotReadyError;

/// A model artifact could not be turned into a servable snapshot.
///
/// Returned only from load paths; a failed load never touches the snapshot
/// that is currently serving.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model artifact {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize model artifact for {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write model artifact {path}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("classifier must expose probabilities for classes [0, 1], got {0:?}")]
    ClassMismatch(Vec<i64>),

    #[error("{component} expects {actual} features, model has {expected}")]
    DimensionMismatch {
        component: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("artifact feature {index} is {actual:?}, extractor produces {expected:?}")]
    FeatureNamesMismatch {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("invalid model component: {0}")]
    InvalidComponent(String),

    #[error("classifier probe failed: {0}")]
    Probe(#[source] ScoringError),

    #[cfg(feature = "onnx")]
    #[error("onnx runtime error: {0}")]
    Onnx(String),
}

/// The transaction cannot be turned into a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureExtractionError {
    #[error("transaction amount is missing")]
    MissingAmount,

    #[error("transaction amount {0} is not a finite non-negative number")]
    InvalidAmount(f64),

    #[error("transaction timestamp {0:?} is not a valid point in time")]
    InvalidTimestamp(String),
}

/// Internal numeric or model inconsistency while scoring a single transaction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("{component} expects {expected} features, got {actual}")]
    DimensionMismatch {
        component: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} produced a non-finite value")]
    NonFinite(&'static str),

    #[error("classifier returned {0} class probabilities, expected 2")]
    ClassCount(usize),

    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("model component panicked: {0}")]
    Panicked(String),
}

/// Everything `ScoringEngine::predict` can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    NotReady(#[from] NotReadyError),

    #[error(transparent)]
    FeatureExtraction(#[from] FeatureExtractionError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

/// Engine configuration values outside their allowed ranges.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("fraud threshold must be in (0, 1), got {0}")]
    Threshold(f64),

    #[error("significance threshold must be a finite non-negative number, got {0}")]
    SignificanceThreshold(f64),

    #[error("max_explanations must be at least 1")]
    MaxExplanations,

    #[error("night hours must be in 0..24, got start={start} end={end}")]
    NightHours { start: u32, end: u32 },
}
