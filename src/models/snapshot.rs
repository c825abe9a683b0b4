//! Immutable model snapshot served by the scoring engine

use crate::error::ModelLoadError;
use crate::models::classifier::{Classifier, EXPECTED_CLASSES};
use crate::models::explainer::Explainer;
use crate::models::scaler::StandardScaler;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Summary of a loaded model, for logs and status endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub version: String,
    pub feature_count: usize,
    pub classifier: String,
    pub explainer: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

/// A validated classifier, scaler and optional explainer.
///
/// Never mutated after construction; the engine replaces the whole snapshot
/// on reload.
#[derive(Debug)]
pub struct ScoringModel {
    version: String,
    feature_names: Vec<String>,
    scaler: StandardScaler,
    classifier: Box<dyn Classifier>,
    explainer: Option<Box<dyn Explainer>>,
    loaded_at: DateTime<Utc>,
}

impl ScoringModel {
    pub fn new(
        version: impl Into<String>,
        feature_names: Vec<String>,
        scaler: StandardScaler,
        classifier: Box<dyn Classifier>,
        explainer: Option<Box<dyn Explainer>>,
    ) -> Result<Self, ModelLoadError> {
        let model = Self {
            version: version.into(),
            feature_names,
            scaler,
            classifier,
            explainer,
            loaded_at: Utc::now(),
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        if self.classifier.classes() != EXPECTED_CLASSES.as_slice() {
            return Err(ModelLoadError::ClassMismatch(self.classifier.classes().to_vec()));
        }

        let expected = self.feature_names.len();
        self.scaler.validate()?;
        check_width("scaler", expected, self.scaler.n_features())?;
        check_width("classifier", expected, self.classifier.n_features())?;
        if let Some(explainer) = &self.explainer {
            check_width("explainer", expected, explainer.n_features())?;
        }

        // Declared classes must match the actual output width.
        let probe = self
            .classifier
            .predict_proba(&vec![0.0; expected])
            .map_err(ModelLoadError::Probe)?;
        if probe.len() != EXPECTED_CLASSES.len() {
            return Err(ModelLoadError::ClassMismatch(
                (0..probe.len() as i64).collect(),
            ));
        }
        Ok(())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn explainer(&self) -> Option<&dyn Explainer> {
        self.explainer.as_deref()
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            version: self.version.clone(),
            feature_count: self.feature_names.len(),
            classifier: self.classifier.kind().to_string(),
            explainer: self.explainer.as_ref().map(|e| e.kind().to_string()),
            loaded_at: self.loaded_at,
        }
    }
}

fn check_width(
    component: &'static str,
    expected: usize,
    actual: usize,
) -> Result<(), ModelLoadError> {
    if expected != actual {
        return Err(ModelLoadError::DimensionMismatch {
            component,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::LogisticRegression;
    use crate::models::explainer::LinearExplainer;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_valid_model() {
        let classifier = LogisticRegression::new(vec![0, 1], vec![1.0, 2.0], 0.5).unwrap();
        let explainer = LinearExplainer::bind(&classifier, vec![0.0, 0.0]).unwrap();
        let model = ScoringModel::new(
            "v1",
            names(2),
            StandardScaler::identity(2),
            Box::new(classifier),
            Some(Box::new(explainer)),
        )
        .unwrap();

        let info = model.info();
        assert_eq!(info.version, "v1");
        assert_eq!(info.feature_count, 2);
        assert_eq!(info.classifier, "logistic_regression");
        assert_eq!(info.explainer.as_deref(), Some("linear"));
    }

    #[test]
    fn test_rejects_wrong_classes() {
        let classifier = LogisticRegression::new(vec![0, 1, 2], vec![1.0], 0.0).unwrap();
        let err = ScoringModel::new(
            "v1",
            names(1),
            StandardScaler::identity(1),
            Box::new(classifier),
            None,
        )
        .unwrap_err();

        assert!(matches!(err, ModelLoadError::ClassMismatch(classes) if classes == vec![0, 1, 2]));
    }

    #[test]
    fn test_rejects_scaler_width() {
        let classifier = LogisticRegression::new(vec![0, 1], vec![1.0, 1.0], 0.0).unwrap();
        let err = ScoringModel::new(
            "v1",
            names(2),
            StandardScaler::identity(3),
            Box::new(classifier),
            None,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ModelLoadError::DimensionMismatch {
                component: "scaler",
                expected: 2,
                actual: 3
            }
        ));
    }
}
