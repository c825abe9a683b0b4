//! Model components and the scoring engine

pub mod classifier;
pub mod explainer;
pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod scaler;
pub mod snapshot;

pub use classifier::{Classifier, LogisticRegression};
pub use explainer::{Explainer, LinearExplainer, OcclusionExplainer};
pub use inference::{ScoringEngine, EXPLANATION_NOT_AVAILABLE};
pub use loader::{ClassifierSpec, ExplainerSpec, ModelArtifact, ModelLoader};
pub use scaler::StandardScaler;
pub use snapshot::{ModelInfo, ScoringModel};
