use fraud_scoring::config::{EngineConfig, FeatureConfig};
use fraud_scoring::error::{FeatureExtractionError, ModelLoadError, PredictError, ScoringError};
use fraud_scoring::models::{
    Classifier, ClassifierSpec, Explainer, ExplainerSpec, ModelArtifact,
    ScoringModel, StandardScaler, EXPLANATION_NOT_AVAILABLE,
};
use fraud_scoring::types::transaction::{AttributeValue, Transaction};
use fraud_scoring::{FeatureExtractor, NotReadyError, ScoringEngine};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Classifier returning a fixed fraud probability and counting its calls
#[derive(Debug)]
struct FixedClassifier {
    probability: f64,
    n_features: usize,
    calls: Arc<AtomicUsize>,
}

impl Classifier for FixedClassifier {
    fn kind(&self) -> &'static str {
        "fixed"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &[0, 1]
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ScoringError> {
        assert_eq!(features.len(), self.n_features);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![1.0 - self.probability, self.probability])
    }
}

#[derive(Debug)]
struct PanickingExplainer(usize);

impl Explainer for PanickingExplainer {
    fn kind(&self) -> &'static str {
        "panicking"
    }

    fn n_features(&self) -> usize {
        self.0
    }

    fn attributions(
        &self,
        _classifier: &dyn Classifier,
        _scaled: &[f64],
    ) -> Result<Vec<f64>, ScoringError> {
        panic!("explainer exploded")
    }
}

fn engine() -> ScoringEngine {
    engine_with(EngineConfig::default())
}

fn engine_with(config: EngineConfig) -> ScoringEngine {
    ScoringEngine::new(config, FeatureExtractor::new(&FeatureConfig::default())).unwrap()
}

fn fixed_model(
    engine: &ScoringEngine,
    probability: f64,
    explainer: Option<Box<dyn Explainer>>,
) -> (ScoringModel, Arc<AtomicUsize>) {
    let n = engine.feature_names().len();
    let calls = Arc::new(AtomicUsize::new(0));
    let model = ScoringModel::new(
        format!("fixed-{}", probability),
        engine.feature_names().to_vec(),
        StandardScaler::identity(n),
        Box::new(FixedClassifier {
            probability,
            n_features: n,
            calls: calls.clone(),
        }),
        explainer,
    )
    .unwrap();
    calls.store(0, Ordering::SeqCst);
    (model, calls)
}

fn demo_artifact() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("models/fraud_model.json")
}

fn scenario_transaction() -> Transaction {
    let json = r#"{
        "amount": 9999.99,
        "timestamp": "2024-01-01T00:00:00",
        "merchant_id": "M1",
        "card_number": "4111111111111111",
        "transaction_type": "online",
        "location": null
    }"#;
    serde_json::from_str(json).unwrap()
}

fn sample_transactions() -> Vec<Transaction> {
    let types = ["online", "in_store", "atm", "transfer", "crypto"];
    (0..40)
        .map(|i| {
            let tx = Transaction::new(
                (i as f64) * 613.37,
                format!("2024-02-{:02}T{:02}:15:00", 1 + i % 28, i % 24),
                format!("M{}", i % 7),
                "5500000000000004",
                types[i % types.len()],
            );
            if i % 3 == 0 {
                tx.with_location("Paris")
                    .with_attribute("device", AttributeValue::Text("mobile".to_string()))
            } else {
                tx
            }
        })
        .collect()
}

#[test]
fn predict_before_load_is_not_ready() {
    let engine = engine();

    assert!(!engine.is_ready());
    assert_eq!(engine.model_info(), None);
    assert_eq!(
        engine.predict(&scenario_transaction()),
        Err(PredictError::NotReady(NotReadyError))
    );
}

#[test]
fn high_amount_scenario_is_flagged() {
    let engine = engine();
    let (model, _) = fixed_model(&engine, 0.82, None);
    engine.install(model).unwrap();

    let result = engine.predict(&scenario_transaction()).unwrap();
    assert_eq!(result.fraud_probability, 0.82);
    assert!(result.is_fraud);
    assert!((result.risk_score - 82.0).abs() < 1e-9);
}

#[test]
fn missing_amount_fails_before_classifier() {
    let engine = engine();
    let (model, calls) = fixed_model(&engine, 0.82, None);
    engine.install(model).unwrap();

    let mut tx = scenario_transaction();
    tx.amount = None;

    assert_eq!(
        engine.extract_features(&tx),
        Err(FeatureExtractionError::MissingAmount)
    );
    assert_eq!(
        engine.predict(&tx),
        Err(PredictError::FeatureExtraction(FeatureExtractionError::MissingAmount))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn no_explainer_returns_marker_only() {
    let engine = engine();
    let (model, _) = fixed_model(&engine, 0.3, None);
    engine.install(model).unwrap();

    for tx in sample_transactions().iter().skip(1) {
        let result = engine.predict(tx).unwrap();
        assert_eq!(result.explanation, vec![EXPLANATION_NOT_AVAILABLE.to_string()]);
    }
}

#[test]
fn feature_extraction_is_deterministic() {
    let engine = engine();
    for tx in sample_transactions() {
        assert_eq!(engine.extract_features(&tx), engine.extract_features(&tx));
    }
}

#[test]
fn demo_artifact_predictions_are_bounded_and_explained() {
    let config = EngineConfig {
        max_explanations: 3,
        ..EngineConfig::default()
    };
    let engine = engine_with(config);
    let info = engine.load(demo_artifact()).unwrap();
    assert_eq!(info.explainer.as_deref(), Some("linear"));

    for tx in sample_transactions() {
        let result = engine.predict(&tx).unwrap();

        assert!((0.0..=1.0).contains(&result.fraud_probability));
        assert!((0.0..=100.0).contains(&result.risk_score));
        assert!((result.risk_score - result.fraud_probability * 100.0).abs() < 1e-9);
        assert_eq!(result.is_fraud, result.fraud_probability > 0.5);
        assert!(result.explanation.len() <= 3);
        for line in &result.explanation {
            let name = line.split(" (").next().unwrap();
            assert!(engine.feature_names().iter().any(|n| n == name), "{}", line);
            assert!(!line.contains("5500000000000004"));
        }
    }
}

#[test]
fn threshold_is_configurable() {
    for threshold in [0.1, 0.5, 0.81, 0.82, 0.9] {
        let engine = engine_with(EngineConfig {
            threshold,
            ..EngineConfig::default()
        });
        let (model, _) = fixed_model(&engine, 0.82, None);
        engine.install(model).unwrap();

        let result = engine.predict(&scenario_transaction()).unwrap();
        assert_eq!(result.is_fraud, 0.82 > threshold, "threshold {}", threshold);
    }
}

#[test]
fn failed_reload_keeps_previous_model() {
    let engine = engine();
    engine.load(demo_artifact()).unwrap();
    let before: Vec<_> = sample_transactions()
        .iter()
        .map(|tx| engine.predict(tx).unwrap())
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("narrow.json");
    ModelArtifact {
        version: "narrow".to_string(),
        feature_names: None,
        scaler: StandardScaler::identity(3),
        classifier: ClassifierSpec::LogisticRegression {
            classes: vec![0, 1],
            coefficients: vec![1.0; 3],
            intercept: 0.0,
        },
        explainer: None,
    }
    .save(&path)
    .unwrap();

    let err = engine.load(&path).unwrap_err();
    assert!(matches!(err, ModelLoadError::DimensionMismatch { .. }));
    assert!(matches!(
        engine.load(dir.path().join("missing.json")),
        Err(ModelLoadError::Io { .. })
    ));

    assert_eq!(engine.model_info().unwrap().version, "2024.01.0-demo");
    let after: Vec<_> = sample_transactions()
        .iter()
        .map(|tx| engine.predict(tx).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn reload_replaces_model() {
    let engine = engine();
    engine.load(demo_artifact()).unwrap();

    let n = engine.feature_names().len();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v2.json");
    ModelArtifact {
        version: "v2".to_string(),
        feature_names: Some(engine.feature_names().to_vec()),
        scaler: StandardScaler::identity(n),
        classifier: ClassifierSpec::LogisticRegression {
            classes: vec![0, 1],
            coefficients: vec![0.0; n],
            intercept: 0.0,
        },
        explainer: Some(ExplainerSpec::Occlusion {
            baseline: vec![0.0; n],
        }),
    }
    .save(&path)
    .unwrap();

    let info = engine.load(&path).unwrap();
    assert_eq!(info.version, "v2");

    let result = engine.predict(&scenario_transaction()).unwrap();
    assert_eq!(result.model_version, "v2");
    assert_eq!(result.fraud_probability, 0.5);
    assert!(!result.is_fraud);
    // Zero coefficients: occluding any feature changes nothing
    assert!(result.explanation.is_empty());
}

#[test]
fn three_class_classifier_is_rejected() {
    #[derive(Debug)]
    struct ThreeClass;

    impl Classifier for ThreeClass {
        fn kind(&self) -> &'static str {
            "three_class"
        }
        fn n_features(&self) -> usize {
            14
        }
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }
        fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>, ScoringError> {
            Ok(vec![0.2, 0.3, 0.5])
        }
    }

    let engine = engine();
    let err = ScoringModel::new(
        "bad",
        engine.feature_names().to_vec(),
        StandardScaler::identity(14),
        Box::new(ThreeClass),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ModelLoadError::ClassMismatch(_)));
}

#[test]
fn explainer_panic_becomes_scoring_error() {
    let engine = engine();
    let n = engine.feature_names().len();
    let (model, _) = fixed_model(&engine, 0.6, Some(Box::new(PanickingExplainer(n))));
    engine.install(model).unwrap();

    match engine.predict(&scenario_transaction()) {
        Err(PredictError::Scoring(ScoringError::Panicked(message))) => {
            assert!(message.contains("explainer exploded"))
        }
        other => panic!("unexpected result: {:?}", other),
    }

    // The engine keeps serving after a failed prediction
    assert!(engine.is_ready());
}

#[test]
fn concurrent_predictions_during_reload() {
    let engine = Arc::new(engine());
    let (low, _) = fixed_model(&engine, 0.2, None);
    engine.install(low).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let engine = engine.clone();
            scope.spawn(move || {
                for _ in 0..500 {
                    let result = engine.predict(&scenario_transaction()).unwrap();
                    // Every result comes from one complete snapshot
                    match result.model_version.as_str() {
                        "fixed-0.2" => assert_eq!(result.fraud_probability, 0.2),
                        "fixed-0.9" => assert_eq!(result.fraud_probability, 0.9),
                        other => panic!("unknown model {}", other),
                    }
                    assert_eq!(result.is_fraud, result.fraud_probability > 0.5);
                }
            });
        }

        let engine = engine.clone();
        scope.spawn(move || {
            for i in 0..50 {
                let probability = if i % 2 == 0 { 0.9 } else { 0.2 };
                let (model, _) = fixed_model(&engine, probability, None);
                engine.install(model).unwrap();
            }
        });
    });

    assert!(engine.is_ready());
}

#[test]
fn batch_predictions_fail_independently() {
    let engine = engine();
    engine.load(demo_artifact()).unwrap();

    let mut missing_amount = scenario_transaction();
    missing_amount.amount = None;
    let mut bad_timestamp = scenario_transaction();
    bad_timestamp.timestamp = "yesterday".to_string();
    let batch = vec![scenario_transaction(), missing_amount, bad_timestamp];

    let results = engine.predict_batch(&batch);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0], engine.predict(&batch[0]));
    assert!(results[0].is_ok());
    assert_eq!(
        results[1],
        Err(PredictError::FeatureExtraction(FeatureExtractionError::MissingAmount))
    );
    assert!(matches!(
        results[2],
        Err(PredictError::FeatureExtraction(FeatureExtractionError::InvalidTimestamp(_)))
    ));
}
