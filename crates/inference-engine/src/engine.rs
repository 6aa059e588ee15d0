//! Inference Engine Implementation

use crate::artifact::load_model;
use crate::InferenceError;
use payload_codec::{FeatureVector, Prediction};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Raw output of a model before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// A single value
    Scalar(Prediction),
    /// One value per output slot; only the first is used
    Sequence(Vec<Prediction>),
}

/// A loaded model artifact
pub trait Model: Send + Sync {
    /// Run the model on one row of features
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError>;

    /// Number of features the model expects, when known
    fn input_len(&self) -> Option<usize> {
        None
    }

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Result of a timed inference call
#[derive(Debug, Clone, Copy)]
pub struct InferenceResult {
    /// The prediction
    pub prediction: Prediction,
    /// Wall-clock time spent inside `predict`
    pub latency: Duration,
}

impl InferenceResult {
    /// Latency in fractional seconds
    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }
}

/// Synchronous prediction capability
pub trait InferencePort {
    /// Predict a single scalar for one feature vector
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError>;

    /// Predict and measure the time spent in exactly that call
    fn infer(&self, features: &FeatureVector) -> Result<InferenceResult, InferenceError> {
        let start = Instant::now();
        let prediction = self.predict(features)?;
        let latency = start.elapsed();

        Ok(InferenceResult { prediction, latency })
    }
}

/// Inference port backed by one owned model
pub struct InferenceEngine {
    /// Loaded model
    model: Box<dyn Model>,
    /// Where the model came from
    source: String,
}

impl InferenceEngine {
    /// Wrap an already constructed model
    pub fn new(model: Box<dyn Model>) -> Self {
        Self {
            model,
            source: "in-memory".to_string(),
        }
    }

    /// Load a model artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let model = load_model(path)?;
        info!("Loaded: {} ({})", path.display(), model.describe());

        Ok(Self {
            model,
            source: path.display().to_string(),
        })
    }

    /// Model source (path or "in-memory")
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Description of the wrapped model
    pub fn describe(&self) -> String {
        self.model.describe()
    }
}

impl InferencePort for InferenceEngine {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        if let Some(expected) = self.model.input_len() {
            if expected != features.len() {
                return Err(InferenceError::InvalidInputShape {
                    expected: format!("[1, {}]", expected),
                    actual: format!("[1, {}]", features.len()),
                });
            }
        }

        let prediction = match self.model.predict(features.values())? {
            ModelOutput::Scalar(prediction) => prediction,
            ModelOutput::Sequence(values) => {
                values.into_iter().next().ok_or(InferenceError::EmptyOutput)?
            }
        };

        debug!("Prediction: {}", prediction);
        Ok(prediction)
    }
}
