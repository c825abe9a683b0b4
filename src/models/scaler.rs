//! Standard scaler fitted at training time

use crate::error::{ModelLoadError, ScoringError};
use serde::{Deserialize, Serialize};

/// Normalizes raw features to `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelLoadError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Identity transform over `n` features.
    pub fn identity(n: usize) -> Self {
        Self {
            mean: vec![0.0; n],
            scale: vec![1.0; n],
        }
    }

    /// Number of features the scaler was fitted on.
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self) -> Result<(), ModelLoadError> {
        if self.mean.len() != self.scale.len() {
            return Err(ModelLoadError::InvalidComponent(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(ModelLoadError::InvalidComponent(
                "scaler mean contains non-finite values".to_string(),
            ));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ModelLoadError::InvalidComponent(
                "scaler scale must be finite and positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if features.len() != self.n_features() {
            return Err(ScoringError::DimensionMismatch {
                component: "scaler",
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let scaled: Vec<f64> = features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect();

        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(ScoringError::NonFinite("scaler"));
        }
        Ok(scaled)
    }
}
