//! Payload Codec
//!
//! Inference input/output types and the serialization both peers agree on.
//! The framing layer treats the encoded bytes as an opaque blob.

mod codec;
mod types;

pub use codec::WireFormat;
pub use types::{FeatureVector, Prediction};

use thiserror::Error;

/// Errors while encoding or decoding a payload
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Encode failed ({format}): {reason}")]
    Encode { format: &'static str, reason: String },
    #[error("Decode failed ({format}): {reason}")]
    Decode { format: &'static str, reason: String },
    #[error("Unknown wire format: {0}")]
    UnknownFormat(String),
}
