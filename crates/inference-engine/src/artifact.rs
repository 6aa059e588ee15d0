//! Model Artifacts
//!
//! JSON-described decision trees and linear models, plus ONNX graphs when
//! the `onnx` feature is enabled.

use crate::engine::{Model, ModelOutput};
use crate::InferenceError;
use payload_codec::Prediction;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// What kind of value a model produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Outputs are class codes
    #[default]
    Classification,
    /// Outputs are continuous values
    Regression,
}

impl Task {
    fn to_prediction(self, value: f64) -> Prediction {
        match self {
            Task::Classification => Prediction::Class(value.round() as i64),
            Task::Regression => Prediction::Value(value),
        }
    }
}

/// One node of a flattened binary tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` when `features[feature] <= threshold`, otherwise `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node; multi-output trees carry several values
    Leaf { value: Vec<f64> },
}

/// Decision tree stored as a node array rooted at index 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub n_features: usize,
    #[serde(default)]
    pub task: Task,
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Check node references before the tree is used
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.nodes.is_empty() {
            return Err(InferenceError::ModelLoadError("decision tree has no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split { feature, left, right, .. } => {
                    if *feature >= self.n_features {
                        return Err(InferenceError::ModelLoadError(format!(
                            "node {} splits on feature {} but model has {} features",
                            idx, feature, self.n_features
                        )));
                    }
                    if *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(InferenceError::ModelLoadError(format!(
                            "node {} points outside the tree",
                            idx
                        )));
                    }
                }
                TreeNode::Leaf { value } if value.is_empty() => {
                    return Err(InferenceError::ModelLoadError(format!("leaf {} has no value", idx)));
                }
                TreeNode::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

impl Model for DecisionTree {
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError> {
        let mut idx = 0;
        // A well-formed tree reaches a leaf in at most `nodes.len()` steps
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = features.get(*feature).copied().ok_or_else(|| {
                        InferenceError::InferenceFailed(format!("missing feature {}", feature))
                    })?;
                    idx = if x <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => {
                    let output = match value.as_slice() {
                        [single] => ModelOutput::Scalar(self.task.to_prediction(*single)),
                        many => ModelOutput::Sequence(
                            many.iter().map(|v| self.task.to_prediction(*v)).collect(),
                        ),
                    };
                    return Ok(output);
                }
                None => {
                    return Err(InferenceError::InferenceFailed(format!("node {} does not exist", idx)));
                }
            }
        }

        Err(InferenceError::InferenceFailed("tree traversal did not terminate".to_string()))
    }

    fn input_len(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn describe(&self) -> String {
        format!("DecisionTree(nodes={}, features={}, task={:?})", self.nodes.len(), self.n_features, self.task)
    }
}

/// Linear model: `score = weights · x + bias`.
///
/// With a `threshold` the score is turned into class `1` (above) or `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Model for LinearModel {
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError> {
        let score = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;

        let prediction = match self.threshold {
            Some(threshold) => Prediction::Class(i64::from(score > threshold)),
            None => Prediction::Value(score),
        };
        Ok(ModelOutput::Scalar(prediction))
    }

    fn input_len(&self) -> Option<usize> {
        Some(self.weights.len())
    }

    fn describe(&self) -> String {
        format!("LinearModel(features={}, threshold={:?})", self.weights.len(), self.threshold)
    }
}

/// On-disk JSON model description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    DecisionTree(DecisionTree),
    Linear(LinearModel),
}

impl ModelArtifact {
    /// Validate and turn the description into a runnable model
    pub fn into_model(self) -> Result<Box<dyn Model>, InferenceError> {
        match self {
            ModelArtifact::DecisionTree(tree) => {
                tree.validate()?;
                Ok(Box::new(tree))
            }
            ModelArtifact::Linear(linear) => Ok(Box::new(linear)),
        }
    }
}

/// Load a model artifact, choosing the backend from the file extension
pub fn load_model(path: &Path) -> Result<Box<dyn Model>, InferenceError> {
    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    if is_onnx {
        return load_onnx(path);
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", path.display(), e)))?;
    let artifact: ModelArtifact = serde_json::from_str(&text)
        .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", path.display(), e)))?;

    debug!("Parsed model artifact from {}", path.display());
    artifact.into_model()
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Box<dyn Model>, InferenceError> {
    Ok(Box::new(crate::onnx::OnnxModel::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path) -> Result<Box<dyn Model>, InferenceError> {
    Err(InferenceError::ModelLoadError(format!(
        "{}: built without the `onnx` feature",
        path.display()
    )))
}
