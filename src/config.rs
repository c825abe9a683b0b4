//! Configuration management for the fraud scoring service

use crate::error::ConfigError;
use crate::types::prediction::RiskLevelThresholds;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Which feature values are printed in explanation strings
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationValues {
    /// Values after the scaler, i.e. what the classifier saw
    #[default]
    Scaled,
    /// Values as extracted from the transaction
    Raw,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub risk_levels: RiskLevelThresholds,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject scored transactions are published to
    pub result_subject: String,
    /// Subject that triggers a model reload
    pub reload_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Path of the JSON model artifact loaded at startup
    pub artifact_path: String,
    /// Intra-op threads for ONNX classifiers
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Scoring engine behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Probability above which a transaction is flagged as fraud
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Minimum absolute attribution for a feature to be explained
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f64,
    /// Upper bound on explanation strings per prediction
    #[serde(default = "default_max_explanations")]
    pub max_explanations: usize,
    #[serde(default)]
    pub explanation_values: ExplanationValues,
}

fn default_threshold() -> f64 {
    0.5
}

fn default_significance_threshold() -> f64 {
    0.1
}

fn default_max_explanations() -> usize {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            significance_threshold: default_significance_threshold(),
            max_explanations: default_max_explanations(),
            explanation_values: ExplanationValues::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        if !self.significance_threshold.is_finite() || self.significance_threshold < 0.0 {
            return Err(ConfigError::SignificanceThreshold(self.significance_threshold));
        }
        if self.max_explanations == 0 {
            return Err(ConfigError::MaxExplanations);
        }
        Ok(())
    }
}

/// Feature extraction configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    /// Transaction types that get their own one-hot feature
    #[serde(default = "default_transaction_types")]
    pub transaction_types: Vec<String>,
    /// Merchants flagged by the risk team
    #[serde(default)]
    pub high_risk_merchants: Vec<String>,
    /// `additional_data` keys read as numeric features, in order
    #[serde(default)]
    pub numeric_attributes: Vec<String>,
    /// First hour (inclusive) of the night window
    #[serde(default = "default_night_start")]
    pub night_start_hour: u32,
    /// Last hour (exclusive) of the night window
    #[serde(default = "default_night_end")]
    pub night_end_hour: u32,
}

fn default_transaction_types() -> Vec<String> {
    ["online", "in_store", "atm", "transfer"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_night_start() -> u32 {
    22
}

fn default_night_end() -> u32 {
    6
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            transaction_types: default_transaction_types(),
            high_risk_merchants: Vec::new(),
            numeric_attributes: Vec::new(),
            night_start_hour: default_night_start(),
            night_end_hour: default_night_end(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.night_start_hour >= 24 || self.night_end_hour >= 24 {
            return Err(ConfigError::NightHours {
                start: self.night_start_hour,
                end: self.night_end_hour,
            });
        }
        Ok(())
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of transactions scored concurrently
    pub workers: usize,
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between metric summaries
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
    /// Number of recent fraud alerts kept in memory
    #[serde(default = "default_recent_alerts")]
    pub recent_alerts: usize,
}

fn default_report_interval() -> u64 {
    30
}

fn default_recent_alerts() -> usize {
    50
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: default_report_interval(),
            recent_alerts: default_recent_alerts(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app.engine.validate().context("Invalid engine configuration")?;
        app.features
            .validate()
            .context("Invalid feature configuration")?;

        Ok(app)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                result_subject: "transactions.scored".to_string(),
                reload_subject: "fraud.model.reload".to_string(),
            },
            models: ModelsConfig {
                artifact_path: "models/fraud_model.json".to_string(),
                onnx_threads: default_onnx_threads(),
            },
            engine: EngineConfig::default(),
            features: FeatureConfig::default(),
            risk_levels: RiskLevelThresholds::default(),
            pipeline: PipelineConfig { workers: 4 },
            metrics: MetricsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
