//! Inference Input and Output Types

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Text formats have no encoding for NaN or infinity (JSON writes `null`,
/// which does not decode back to a float), so refuse them there.
fn serialize_finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() && !value.is_finite() {
        return Err(S::Error::custom(format!(
            "non-finite value {} has no text encoding",
            value
        )));
    }
    serializer.serialize_f64(*value)
}

/// One inference input: an ordered sequence of numeric features.
///
/// Immutable once built; the values are only reachable through shared
/// borrows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            if let Some(pos) = self.values.iter().position(|v| !v.is_finite()) {
                return Err(S::Error::custom(format!(
                    "feature {} is {}, which has no text encoding",
                    pos, self.values[pos]
                )));
            }
        }
        self.values.serialize(serializer)
    }
}

impl FeatureVector {
    /// Build a vector from owned values
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Feature values in order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no features
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the vector, returning its values
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl From<&[f64]> for FeatureVector {
    fn from(values: &[f64]) -> Self {
        Self::new(values.to_vec())
    }
}

/// Scalar output of one inference call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Prediction {
    /// Categorical class code
    Class(i64),
    /// Continuous value
    Value(#[serde(serialize_with = "serialize_finite")] f64),
}

impl Prediction {
    /// Numeric view of the prediction
    pub fn as_f64(&self) -> f64 {
        match self {
            Prediction::Class(code) => *code as f64,
            Prediction::Value(value) => *value,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Class(code) => write!(f, "{}", code),
            // Always keeps a fractional part so `1.0` never reads as class 1
            Prediction::Value(value) => write!(f, "{:?}", value),
        }
    }
}
