//! Two-class probabilistic classifiers

use crate::error::{ModelLoadError, ScoringError};
use std::fmt::Debug;

/// Class labels every servable classifier must expose, in this order.
pub const EXPECTED_CLASSES: [i64; 2] = [0, 1];

/// Index of the fraud class in [`EXPECTED_CLASSES`].
pub const FRAUD_CLASS_INDEX: usize = 1;

/// A fitted classifier mapping a scaled feature vector to class probabilities.
pub trait Classifier: Send + Sync + Debug {
    /// Short name used in logs and model info
    fn kind(&self) -> &'static str;

    /// Number of input features
    fn n_features(&self) -> usize;

    /// Class labels, aligned with `predict_proba` output
    fn classes(&self) -> &[i64];

    /// Per-class probabilities for a single scaled feature vector
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError>;

    /// Linear view of the classifier, for exact attributions
    fn as_linear(&self) -> Option<&LogisticRegression> {
        None
    }
}

/// Probability mass the classifier assigns to the fraud class.
pub fn fraud_probability(
    classifier: &dyn Classifier,
    features: &[f64],
) -> Result<f64, ScoringError> {
    let proba = classifier.predict_proba(features)?;
    if proba.len() != EXPECTED_CLASSES.len() {
        return Err(ScoringError::ClassCount(proba.len()));
    }
    let p = proba[FRAUD_CLASS_INDEX];
    if !p.is_finite() {
        return Err(ScoringError::NonFinite("classifier"));
    }
    Ok(p)
}

/// Binary logistic regression: `p(fraud) = sigmoid(w·x + b)`
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    classes: Vec<i64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticRegression {
    pub fn new(
        classes: Vec<i64>,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ModelLoadError> {
        if coefficients.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
            return Err(ModelLoadError::InvalidComponent(
                "logistic regression parameters must be finite".to_string(),
            ));
        }
        Ok(Self {
            classes,
            coefficients,
            intercept,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Log-odds of the fraud class
    pub fn decision_function(&self, features: &[f64]) -> Result<f64, ScoringError> {
        if features.len() != self.coefficients.len() {
            return Err(ScoringError::DimensionMismatch {
                component: "classifier",
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }
        let z = self.intercept
            + features
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        if !z.is_finite() {
            return Err(ScoringError::NonFinite("classifier"));
        }
        Ok(z)
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError> {
        let p = sigmoid(self.decision_function(features)?);
        Ok(vec![1.0 - p, p])
    }

    fn as_linear(&self) -> Option<&LogisticRegression> {
        Some(self)
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
