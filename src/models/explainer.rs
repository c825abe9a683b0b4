//! Per-feature attributions for a single prediction

use crate::error::{ModelLoadError, ScoringError};
use crate::models::classifier::{fraud_probability, Classifier};
use std::fmt::Debug;

/// Computes attribution values aligned with the model's feature names.
///
/// Positive attributions push towards fraud, negative ones away from it.
pub trait Explainer: Send + Sync + Debug {
    fn kind(&self) -> &'static str;

    fn n_features(&self) -> usize;

    fn attributions(
        &self,
        classifier: &dyn Classifier,
        scaled: &[f64],
    ) -> Result<Vec<f64>, ScoringError>;
}

/// Exact attributions for a linear model on the log-odds scale:
/// `coef_i * (x_i - background_i)`.
#[derive(Debug, Clone)]
pub struct LinearExplainer {
    coefficients: Vec<f64>,
    background: Vec<f64>,
}

impl LinearExplainer {
    /// Bind to a classifier. Fails unless the classifier is linear and the
    /// background matches its input width.
    pub fn bind(
        classifier: &dyn Classifier,
        background: Vec<f64>,
    ) -> Result<Self, ModelLoadError> {
        let linear = classifier.as_linear().ok_or_else(|| {
            ModelLoadError::InvalidComponent(format!(
                "linear explainer cannot explain a {} classifier",
                classifier.kind()
            ))
        })?;
        if background.len() != linear.coefficients().len() {
            return Err(ModelLoadError::DimensionMismatch {
                component: "explainer background",
                expected: linear.coefficients().len(),
                actual: background.len(),
            });
        }
        if background.iter().any(|b| !b.is_finite()) {
            return Err(ModelLoadError::InvalidComponent(
                "explainer background contains non-finite values".to_string(),
            ));
        }
        Ok(Self {
            coefficients: linear.coefficients().to_vec(),
            background,
        })
    }
}

impl Explainer for LinearExplainer {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn attributions(
        &self,
        _classifier: &dyn Classifier,
        scaled: &[f64],
    ) -> Result<Vec<f64>, ScoringError> {
        if scaled.len() != self.coefficients.len() {
            return Err(ScoringError::DimensionMismatch {
                component: "explainer",
                expected: self.coefficients.len(),
                actual: scaled.len(),
            });
        }
        Ok(scaled
            .iter()
            .zip(self.coefficients.iter().zip(&self.background))
            .map(|(x, (w, b))| w * (x - b))
            .collect())
    }
}

/// Model-agnostic attributions: the drop in fraud probability when a single
/// feature is replaced by its baseline value.
#[derive(Debug, Clone)]
pub struct OcclusionExplainer {
    baseline: Vec<f64>,
}

impl OcclusionExplainer {
    pub fn bind(
        classifier: &dyn Classifier,
        baseline: Vec<f64>,
    ) -> Result<Self, ModelLoadError> {
        if baseline.len() != classifier.n_features() {
            return Err(ModelLoadError::DimensionMismatch {
                component: "explainer baseline",
                expected: classifier.n_features(),
                actual: baseline.len(),
            });
        }
        if baseline.iter().any(|b| !b.is_finite()) {
            return Err(ModelLoadError::InvalidComponent(
                "explainer baseline contains non-finite values".to_string(),
            ));
        }
        Ok(Self { baseline })
    }
}

impl Explainer for OcclusionExplainer {
    fn kind(&self) -> &'static str {
        "occlusion"
    }

    fn n_features(&self) -> usize {
        self.baseline.len()
    }

    fn attributions(
        &self,
        classifier: &dyn Classifier,
        scaled: &[f64],
    ) -> Result<Vec<f64>, ScoringError> {
        if scaled.len() != self.baseline.len() {
            return Err(ScoringError::DimensionMismatch {
                component: "explainer",
                expected: self.baseline.len(),
                actual: scaled.len(),
            });
        }

        let full = fraud_probability(classifier, scaled)?;
        let mut occluded = scaled.to_vec();
        let mut attributions = Vec::with_capacity(scaled.len());

        for (i, &baseline) in self.baseline.iter().enumerate() {
            let original = occluded[i];
            occluded[i] = baseline;
            let p = fraud_probability(classifier, &occluded)?;
            occluded[i] = original;
            attributions.push(full - p);
        }

        Ok(attributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::LogisticRegression;

    fn model() -> LogisticRegression {
        LogisticRegression::new(vec![0, 1], vec![2.0, -1.0, 0.0], 0.0).unwrap()
    }

    #[test]
    fn test_linear_attributions() {
        let classifier = model();
        let explainer = LinearExplainer::bind(&classifier, vec![0.0, 1.0, 0.0]).unwrap();

        let attributions = explainer.attributions(&classifier, &[1.0, 3.0, 7.0]).unwrap();
        assert_eq!(attributions, vec![2.0, -2.0, 0.0]);
    }

    #[test]
    fn test_linear_bind_checks_dimensions() {
        let classifier = model();
        let err = LinearExplainer::bind(&classifier, vec![0.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelLoadError::DimensionMismatch {
                expected: 3,
                actual: 1,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "explainer background expects 1 features, model has 3"
        );

        let err = OcclusionExplainer::bind(&classifier, vec![0.0; 4]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "explainer baseline expects 4 features, model has 3"
        );
    }

    #[test]
    fn test_occlusion_attributions_follow_sign() {
        let classifier = model();
        let explainer = OcclusionExplainer::bind(&classifier, vec![0.0; 3]).unwrap();

        let attributions = explainer.attributions(&classifier, &[1.0, 1.0, 1.0]).unwrap();
        assert!(attributions[0] > 0.0);
        assert!(attributions[1] < 0.0);
        assert_eq!(attributions[2], 0.0);
    }
}
