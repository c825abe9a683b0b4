//! Model artifact loader

use crate::error::ModelLoadError;
use crate::models::classifier::{Classifier, LogisticRegression};
use crate::models::explainer::{Explainer, LinearExplainer, OcclusionExplainer};
use crate::models::scaler::StandardScaler;
use crate::models::snapshot::ScoringModel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialized classifier description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierSpec {
    LogisticRegression {
        classes: Vec<i64>,
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// ONNX graph stored next to the artifact; needs the `onnx` feature
    Onnx {
        path: PathBuf,
        classes: Vec<i64>,
        n_features: usize,
    },
}

/// Serialized explainer description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExplainerSpec {
    Linear { background: Vec<f64> },
    Occlusion { baseline: Vec<f64> },
}

/// On-disk model bundle (JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub scaler: StandardScaler,
    pub classifier: ClassifierSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explainer: Option<ExplainerSpec>,
}

impl ModelArtifact {
    /// Read an artifact from a JSON file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ModelLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the artifact as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelLoadError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self).map_err(|source| ModelLoadError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ModelLoadError::Save {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), version = %self.version, "Model artifact saved");
        Ok(())
    }
}

/// Loader turning artifacts into validated [`ScoringModel`]s
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of ONNX threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load and validate a model artifact from file.
    ///
    /// `default_feature_names` is used when the artifact carries none.
    pub fn load<P: AsRef<Path>>(
        &self,
        path: P,
        default_feature_names: &[String],
    ) -> Result<ScoringModel, ModelLoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading model artifact");

        let artifact = ModelArtifact::read(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.build(artifact, base_dir, default_feature_names)
    }

    /// Build a model from an already parsed artifact
    pub fn build(
        &self,
        artifact: ModelArtifact,
        base_dir: &Path,
        default_feature_names: &[String],
    ) -> Result<ScoringModel, ModelLoadError> {
        let feature_names = artifact
            .feature_names
            .unwrap_or_else(|| default_feature_names.to_vec());

        let classifier = self.build_classifier(artifact.classifier, base_dir)?;
        let explainer = artifact
            .explainer
            .map(|spec| build_explainer(spec, classifier.as_ref()))
            .transpose()?;

        let model = ScoringModel::new(
            artifact.version,
            feature_names,
            artifact.scaler,
            classifier,
            explainer,
        )?;

        let info = model.info();
        info!(
            version = %info.version,
            features = info.feature_count,
            classifier = %info.classifier,
            explainer = ?info.explainer,
            "Model built successfully"
        );

        Ok(model)
    }

    fn build_classifier(
        &self,
        spec: ClassifierSpec,
        base_dir: &Path,
    ) -> Result<Box<dyn Classifier>, ModelLoadError> {
        match spec {
            ClassifierSpec::LogisticRegression {
                classes,
                coefficients,
                intercept,
            } => Ok(Box::new(LogisticRegression::new(
                classes,
                coefficients,
                intercept,
            )?)),
            ClassifierSpec::Onnx {
                path,
                classes,
                n_features,
            } => {
                let path = if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                };
                self.build_onnx(&path, classes, n_features)
            }
        }
    }

    #[cfg(feature = "onnx")]
    fn build_onnx(
        &self,
        path: &Path,
        classes: Vec<i64>,
        n_features: usize,
    ) -> Result<Box<dyn Classifier>, ModelLoadError> {
        let classifier =
            crate::models::onnx::OnnxClassifier::load(path, classes, n_features, self.onnx_threads)?;
        Ok(Box::new(classifier))
    }

    #[cfg(not(feature = "onnx"))]
    fn build_onnx(
        &self,
        path: &Path,
        _classes: Vec<i64>,
        _n_features: usize,
    ) -> Result<Box<dyn Classifier>, ModelLoadError> {
        Err(ModelLoadError::InvalidComponent(format!(
            "{} is an ONNX classifier but onnx support is not enabled",
            path.display()
        )))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn build_explainer(
    spec: ExplainerSpec,
    classifier: &dyn Classifier,
) -> Result<Box<dyn Explainer>, ModelLoadError> {
    match spec {
        ExplainerSpec::Linear { background } => {
            Ok(Box::new(LinearExplainer::bind(classifier, background)?))
        }
        ExplainerSpec::Occlusion { baseline } => {
            Ok(Box::new(OcclusionExplainer::bind(classifier, baseline)?))
        }
    }
}
