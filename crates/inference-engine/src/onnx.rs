//! ONNX Model Backend (tract)

use crate::engine::{Model, ModelOutput};
use crate::InferenceError;
use payload_codec::Prediction;
use std::path::Path;
use tract_onnx::prelude::*;

/// ONNX graph optimized and compiled by tract
pub struct OnnxModel {
    plan: TypedRunnableModel<TypedModel>,
    path: String,
}

impl OnnxModel {
    /// Load and optimize an ONNX file
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            plan,
            path: path.display().to_string(),
        })
    }

    fn run(&self, features: &[f64]) -> TractResult<ModelOutput> {
        let row: Vec<f32> = features.iter().map(|v| *v as f32).collect();
        let input = Tensor::from_shape(&[1, row.len()], &row)?;
        let outputs = self.plan.run(tvec!(input.into()))?;

        let first = outputs
            .first()
            .ok_or_else(|| format_err!("model produced no outputs"))?;
        let is_label = first.datum_type().is_integer();
        let values = first.cast_to::<f64>()?;

        let predictions = values
            .as_slice::<f64>()?
            .iter()
            .map(|v| {
                if is_label {
                    Prediction::Class(*v as i64)
                } else {
                    Prediction::Value(*v)
                }
            })
            .collect();
        Ok(ModelOutput::Sequence(predictions))
    }
}

impl Model for OnnxModel {
    fn predict(&self, features: &[f64]) -> Result<ModelOutput, InferenceError> {
        self.run(features)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("OnnxModel({})", self.path)
    }
}
