//! Inference Engine
//!
//! Wraps one loaded model artifact behind a synchronous `predict` port that
//! always yields a single scalar [`Prediction`].

mod artifact;
mod engine;
#[cfg(feature = "onnx")]
mod onnx;

pub use artifact::{load_model, DecisionTree, LinearModel, ModelArtifact, Task, TreeNode};
pub use engine::{InferenceEngine, InferencePort, InferenceResult, Model, ModelOutput};
#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use payload_codec::{FeatureVector, Prediction};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Model returned an empty output sequence")]
    EmptyOutput,
}
