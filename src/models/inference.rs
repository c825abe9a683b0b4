//! Scoring engine: transaction in, explained fraud prediction out

use crate::config::{AppConfig, EngineConfig, ExplanationValues};
use crate::error::{
    ConfigError, FeatureExtractionError, ModelLoadError, NotReadyError, PredictError,
    ScoringError,
};
use crate::feature_extractor::FeatureExtractor;
use crate::models::classifier::fraud_probability;
use crate::models::loader::ModelLoader;
use crate::models::snapshot::{ModelInfo, ScoringModel};
use crate::types::prediction::PredictionResult;
use crate::types::transaction::Transaction;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

/// Explanation returned when the model has no explainer bound
pub const EXPLANATION_NOT_AVAILABLE: &str = "Model explanation not available";

/// Fraud scoring engine.
///
/// Shared between worker tasks behind an `Arc`. Predictions read an immutable
/// [`ScoringModel`] snapshot; `load` and `install` build the replacement off
/// to the side and swap it in under the write lock, so a failed reload leaves
/// the serving model untouched.
#[derive(Debug)]
pub struct ScoringEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    loader: ModelLoader,
    snapshot: RwLock<Option<Arc<ScoringModel>>>,
}

impl ScoringEngine {
    /// Create an engine with no model loaded
    pub fn new(config: EngineConfig, extractor: FeatureExtractor) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            loader: ModelLoader::new(),
            snapshot: RwLock::new(None),
        })
    }

    /// Create an engine from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.features.validate()?;
        Ok(
            Self::new(config.engine.clone(), FeatureExtractor::new(&config.features))?
                .with_loader(ModelLoader::with_threads(config.models.onnx_threads)),
        )
    }

    pub fn with_loader(mut self, loader: ModelLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn feature_names(&self) -> &[String] {
        self.extractor.feature_names()
    }

    /// Load a model artifact and make it the serving model.
    ///
    /// Blocks on file I/O; keep it off the request path.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<ModelInfo, ModelLoadError> {
        let path = path.as_ref();
        let model = self
            .loader
            .load(path, self.extractor.feature_names())
            .inspect_err(|e| {
                error!(path = %path.display(), error = %e, "Model load failed, keeping current model")
            })?;
        self.install(model)
    }

    /// Make an already built model the serving model.
    pub fn install(&self, model: ScoringModel) -> Result<ModelInfo, ModelLoadError> {
        self.check_feature_names(&model).inspect_err(|e| {
            error!(version = %model.version(), error = %e, "Model rejected, keeping current model")
        })?;

        let info = model.info();
        let previous = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::new(model));

        info!(
            version = %info.version,
            previous = ?previous.as_ref().map(|m| m.version()),
            features = info.feature_count,
            "Scoring model installed"
        );
        Ok(info)
    }

    fn check_feature_names(&self, model: &ScoringModel) -> Result<(), ModelLoadError> {
        let expected = self.extractor.feature_names();
        let actual = model.feature_names();
        if expected.len() != actual.len() {
            return Err(ModelLoadError::DimensionMismatch {
                component: "feature extractor",
                expected: actual.len(),
                actual: expected.len(),
            });
        }
        if let Some(index) = expected.iter().zip(actual).position(|(e, a)| e != a) {
            return Err(ModelLoadError::FeatureNamesMismatch {
                index,
                expected: expected[index].clone(),
                actual: actual[index].clone(),
            });
        }
        Ok(())
    }

    /// Whether a model has been loaded
    pub fn is_ready(&self) -> bool {
        self.read_snapshot().is_some()
    }

    /// Info on the serving model
    pub fn model_info(&self) -> Option<ModelInfo> {
        self.read_snapshot().map(|m| m.info())
    }

    fn read_snapshot(&self) -> Option<Arc<ScoringModel>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Raw feature vector for a transaction, aligned with `feature_names()`
    pub fn extract_features(&self, tx: &Transaction) -> Result<Vec<f64>, FeatureExtractionError> {
        self.extractor.extract(tx)
    }

    /// Score a single transaction
    pub fn predict(&self, tx: &Transaction) -> Result<PredictionResult, PredictError> {
        let model = self.read_snapshot().ok_or(NotReadyError)?;

        let features = self.extract_features(tx).inspect_err(|e| {
            debug!(transaction_id = ?tx.transaction_id, error = %e, "Feature extraction failed")
        })?;

        let scored = panic::catch_unwind(AssertUnwindSafe(|| self.score(&model, &features)))
            .unwrap_or_else(|payload| Err(ScoringError::Panicked(panic_message(payload))));

        let result = scored.inspect_err(|e| {
            error!(
                transaction_id = ?tx.transaction_id,
                model_version = %model.version(),
                error = %e,
                "Scoring failed"
            )
        })?;

        debug!(
            transaction_id = ?tx.transaction_id,
            merchant_id = %tx.merchant_id,
            fraud_probability = result.fraud_probability,
            is_fraud = result.is_fraud,
            "Transaction scored"
        );
        Ok(result)
    }

    /// Score a batch of transactions independently
    pub fn predict_batch(&self, txs: &[Transaction]) -> Vec<Result<PredictionResult, PredictError>> {
        txs.iter().map(|tx| self.predict(tx)).collect()
    }

    fn score(
        &self,
        model: &ScoringModel,
        features: &[f64],
    ) -> Result<PredictionResult, ScoringError> {
        let scaled = model.scaler().transform(features)?;

        let raw_probability = fraud_probability(model.classifier(), &scaled)?;
        if !(0.0..=1.0).contains(&raw_probability) {
            warn!(
                model_version = %model.version(),
                probability = raw_probability,
                "Classifier probability out of range, clamping"
            );
        }
        let fraud_probability = raw_probability.clamp(0.0, 1.0);
        let is_fraud = fraud_probability > self.config.threshold;
        let risk_score = (fraud_probability * 100.0).clamp(0.0, 100.0);

        let explanation = match model.explainer() {
            Some(explainer) => {
                let attributions = explainer.attributions(model.classifier(), &scaled)?;
                let values = match self.config.explanation_values {
                    ExplanationValues::Scaled => scaled.as_slice(),
                    ExplanationValues::Raw => features,
                };
                self.explain(model.feature_names(), values, &attributions)?
            }
            None => vec![EXPLANATION_NOT_AVAILABLE.to_string()],
        };

        Ok(PredictionResult {
            fraud_probability,
            is_fraud,
            risk_score,
            explanation,
            model_version: model.version().to_string(),
        })
    }

    /// Explanation strings for significant attributions, strongest first
    fn explain(
        &self,
        names: &[String],
        values: &[f64],
        attributions: &[f64],
    ) -> Result<Vec<String>, ScoringError> {
        if attributions.len() != names.len() {
            return Err(ScoringError::DimensionMismatch {
                component: "explainer",
                expected: names.len(),
                actual: attributions.len(),
            });
        }
        if attributions.iter().any(|a| !a.is_finite()) {
            return Err(ScoringError::NonFinite("explainer"));
        }

        let mut significant: Vec<(usize, f64)> = attributions
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, a)| a.abs() > self.config.significance_threshold)
            .collect();

        // Stable order: magnitude descending, then feature index ascending
        significant.sort_by(|(ia, a), (ib, b)| {
            b.abs()
                .partial_cmp(&a.abs())
                .unwrap_or(Ordering::Equal)
                .then(ia.cmp(ib))
        });
        significant.truncate(self.config.max_explanations);

        Ok(significant
            .into_iter()
            .map(|(i, attribution)| {
                let impact = if attribution > 0.0 {
                    "increases"
                } else {
                    "decreases"
                };
                format!("{} ({:.2}) {} fraud probability", names[i], values[i], impact)
            })
            .collect())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
