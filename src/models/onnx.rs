//! ONNX Runtime backed classifier

use crate::error::{ModelLoadError, ScoringError};
use crate::models::classifier::Classifier;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Classifier exported to ONNX (sklearn, XGBoost, LightGBM, CatBoost).
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    classes: Vec<i64>,
    n_features: usize,
}

impl OnnxClassifier {
    /// Load an ONNX graph from file
    pub fn load(
        path: &Path,
        classes: Vec<i64>,
        n_features: usize,
        threads: usize,
    ) -> Result<Self, ModelLoadError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| ModelLoadError::Onnx(format!("{}: {}", path.display(), e)))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "ONNX model loaded"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            classes,
            n_features,
        })
    }

    /// Class probabilities from the named output, falling back to any
    /// non-label output
    fn extract_probabilities(&self, outputs: &SessionOutputs) -> Result<Vec<f64>, ScoringError> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(probs) = self.extract_from_value(&output) {
                return Ok(probs);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(probs) = self.extract_from_value(&output) {
                debug!(model = %self.name, output = %name, "Extracted from fallback output");
                return Ok(probs);
            }
        }

        Err(ScoringError::Classifier(format!(
            "{}: no two-class probability output found",
            self.name
        )))
    }

    fn extract_from_value(&self, output: &DynValue) -> Option<Vec<f64>> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return class_probs_from_tensor(&shape, data);
        }
        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return self.extract_from_sequence_map(output).ok();
        }
        None
    }

    /// `seq(map(int64, float))`, as exported by CatBoost and LightGBM
    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<Vec<f64>, ScoringError> {
        let to_err = |e: ort::Error| ScoringError::Classifier(format!("{}: {}", self.name, e));
        let allocator = Allocator::default();

        let sequence = output.downcast_ref::<DynSequenceValueType>().map_err(to_err)?;
        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(to_err)?;
        let map_value = maps
            .first()
            .ok_or_else(|| ScoringError::Classifier(format!("{}: empty sequence", self.name)))?;
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>().map_err(to_err)?;

        class_probs_from_map(&kv_pairs).ok_or_else(|| {
            ScoringError::Classifier(format!(
                "{}: probability map must hold exactly classes 0 and 1",
                self.name
            ))
        })
    }
}

/// First row of a `[batch, 2]` or `[2]` tensor; any other width is rejected
fn class_probs_from_tensor(shape: &[i64], data: &[f32]) -> Option<Vec<f64>> {
    match shape.last() {
        Some(2) if data.len() >= 2 => Some(data[..2].iter().map(|&p| p as f64).collect()),
        _ => None,
    }
}

/// `[p(0), p(1)]` from a class-id map holding exactly those two classes
fn class_probs_from_map(pairs: &[(i64, f32)]) -> Option<Vec<f64>> {
    if pairs.len() != 2 {
        return None;
    }
    let prob = |class: i64| {
        pairs
            .iter()
            .find(|(class_id, _)| *class_id == class)
            .map(|(_, p)| *p as f64)
    };
    Some(vec![prob(0)?, prob(1)?])
}

impl Classifier for OnnxClassifier {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if features.len() != self.n_features {
            return Err(ScoringError::DimensionMismatch {
                component: "classifier",
                expected: self.n_features,
                actual: features.len(),
            });
        }

        let shape = vec![1_i64, features.len() as i64];
        let input: Vec<f32> = features.iter().map(|&f| f as f32).collect();
        let tensor = Tensor::from_array((shape, input))
            .map_err(|e| ScoringError::Classifier(format!("{}: {}", self.name, e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ScoringError::Classifier(format!("{}: session lock poisoned", self.name)))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| ScoringError::Classifier(format!("{}: {}", self.name, e)))?;

        self.extract_probabilities(&outputs)
    }
}

impl fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("name", &self.name)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("classes", &self.classes)
            .field("n_features", &self.n_features)
            .finish()
    }
}
